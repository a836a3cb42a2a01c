//! Static credentials from the shared credentials and config files.
//!
//! Only `aws_access_key_id`, `aws_secret_access_key` and `aws_session_token`
//! are read. Profiles that rely on role assumption or sso are skipped.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use sheetpull_error::{Result, ResultExt};
use tracing::debug;

use super::credentials::AwsCredentials;

const DEFAULT_PROFILE: &str = "default";

type Profiles = HashMap<String, HashMap<String, String>>;

/// Which file a profile is read from. Sections are named differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    /// `[name]`
    Credentials,
    /// `[default]` or `[profile name]`
    Config,
}

/// Look up the selected profile, credentials file first.
pub(crate) fn from_shared_files(
    get: impl Fn(&str) -> Option<String>,
    home: Option<&Path>,
) -> Result<Option<AwsCredentials>> {
    let profile = get("AWS_PROFILE")
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

    let files = [
        (
            file_path(&get, "AWS_SHARED_CREDENTIALS_FILE", home, "credentials"),
            FileKind::Credentials,
        ),
        (
            file_path(&get, "AWS_CONFIG_FILE", home, "config"),
            FileKind::Config,
        ),
    ];

    for (path, kind) in files {
        let Some(path) = path else {
            continue;
        };
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(e).context_fn(|| {
                    format!("Failed to read aws profile file '{}'", path.display())
                });
            }
        };

        let profiles = parse_profiles(&contents, kind);
        if let Some(creds) = profiles.get(&profile).and_then(static_credentials) {
            debug!(%profile, path = %path.display(), "using aws credentials from profile");
            return Ok(Some(creds));
        }
    }

    Ok(None)
}

fn file_path(
    get: &impl Fn(&str) -> Option<String>,
    var: &str,
    home: Option<&Path>,
    name: &str,
) -> Option<PathBuf> {
    match get(var).filter(|p| !p.is_empty()) {
        Some(path) => Some(PathBuf::from(path)),
        None => home.map(|home| home.join(".aws").join(name)),
    }
}

fn static_credentials(props: &HashMap<String, String>) -> Option<AwsCredentials> {
    let key_id = props.get("aws_access_key_id").filter(|v| !v.is_empty())?;
    let secret = props
        .get("aws_secret_access_key")
        .filter(|v| !v.is_empty())?;
    Some(AwsCredentials {
        key_id: key_id.clone(),
        secret: secret.clone(),
        session_token: props
            .get("aws_session_token")
            .filter(|v| !v.is_empty())
            .cloned(),
    })
}

fn parse_profiles(contents: &str, kind: FileKind) -> Profiles {
    let mut profiles = Profiles::new();
    let mut current: Option<String> = None;

    for line in contents.lines() {
        // Indented lines belong to nested sub sections, none of which hold
        // static keys.
        if line.starts_with([' ', '\t']) {
            continue;
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with(['#', ';']) {
            continue;
        }

        if let Some(section) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            current = section_profile(section.trim(), kind);
            continue;
        }

        let (Some(profile), Some((key, val))) = (&current, line.split_once('=')) else {
            continue;
        };
        profiles
            .entry(profile.clone())
            .or_default()
            .insert(key.trim().to_ascii_lowercase(), val.trim().to_string());
    }

    profiles
}

fn section_profile(section: &str, kind: FileKind) -> Option<String> {
    match kind {
        FileKind::Credentials => Some(section.to_string()),
        FileKind::Config => {
            if section == DEFAULT_PROFILE {
                return Some(section.to_string());
            }
            section
                .strip_prefix("profile")
                .filter(|rest| rest.starts_with([' ', '\t']))
                .map(|rest| rest.trim().to_string())
        }
    }
}
