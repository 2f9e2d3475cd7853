//! Credential Loader
//!
//! Reads the gallery API key from a local `KEY=value` file each time a route
//! needs it. Nothing is cached, so editing the file takes effect on the next
//! request.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Key name looked up in the credential file by default.
pub const DEFAULT_KEY_NAME: &str = "CIVITAI_API_KEY";

/// Secret bearer token for the remote gallery.
///
/// `Debug` and `Display` never print the token.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the outbound leg only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the token in `text` with the redaction placeholder.
    pub fn scrub(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, crate::error::REDACTED)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***redacted***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::error::REDACTED)
    }
}

/// Source of the credential, consulted at request time.
pub trait CredentialSource: Send + Sync {
    /// `None` means "no credential configured"; it only becomes an error
    /// when a route needs the key.
    fn load(&self) -> Option<ApiKey>;
}

/// Credential file beside the service, one `KEY=value` per line.
#[derive(Debug, Clone)]
pub struct ApiKeyFile {
    path: PathBuf,
    key_name: String,
}

impl ApiKeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_key_name(path, DEFAULT_KEY_NAME)
    }

    pub fn with_key_name(path: impl Into<PathBuf>, key_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key_name: key_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSource for ApiKeyFile {
    fn load(&self) -> Option<ApiKey> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read API key file");
                return None;
            }
        };
        parse_key_line(&content, &self.key_name)
    }
}

/// Fixed credential, used when the key is injected programmatically.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<ApiKey>);

impl StaticCredential {
    pub fn new(key: Option<ApiKey>) -> Self {
        Self(key)
    }
}

impl CredentialSource for StaticCredential {
    fn load(&self) -> Option<ApiKey> {
        self.0.clone()
    }
}

fn parse_key_line(content: &str, key_name: &str) -> Option<ApiKey> {
    let prefix = format!("{}=", key_name);
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ApiKey::new)
}
