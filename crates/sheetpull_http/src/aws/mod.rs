//! Minimal AWS clients, signed with SigV4.

pub mod credentials;
mod profile;
pub mod s3;
pub mod secrets;
pub mod signer;
