/// Lowercase hex encoding, as required by SigV4 hashes and signatures.
pub fn encode(buf: impl AsRef<[u8]>) -> String {
    const CHARS: &[u8; 16] = b"0123456789abcdef";

    let buf = buf.as_ref();
    let mut out = String::with_capacity(buf.len() * 2);
    for &b in buf {
        out.push(CHARS[(b >> 4) as usize] as char);
        out.push(CHARS[(b & 0xF) as usize] as char);
    }
    out
}
