//! Username/password credentials and the line-oriented credentials file.
//!
//! File format, one user per line:
//! ```text
//! # comment
//! cluster: cluster
//! admin = OBF:1rpa1rpc, admin
//! ```
//! Anything after the first `,` names roles and is ignored here. Lines that
//! cannot be parsed are logged and skipped; the other users still load.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const OBFUSCATED_PREFIX: &str = "OBF:";

/// Errors reading a credentials file.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid obfuscated password: {0}")]
    Obfuscation(&'static str),

    #[error("{0}")]
    Entry(&'static str),
}

/// A username/password pair.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// In-memory user store loaded from a credentials file.
#[derive(Default, Clone)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    /// Read and parse a credentials file.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut users = HashMap::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            match parse_entry(line) {
                Ok((username, password)) => {
                    users.insert(username.to_string(), password);
                }
                Err(reason) => {
                    tracing::warn!(
                        line = index + 1,
                        reason = %reason,
                        "Skipping credentials entry"
                    );
                }
            }
        }

        Self { users }
    }

    pub fn insert(&mut self, credentials: Credentials) {
        self.users.insert(credentials.username, credentials.password);
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .map(|stored| stored == password)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn parse_entry(line: &str) -> Result<(&str, String), CredentialsError> {
    let split_at = line
        .find([':', '='])
        .ok_or(CredentialsError::Entry("expected 'username: password'"))?;
    let username = line[..split_at].trim();
    if username.is_empty() {
        return Err(CredentialsError::Entry("empty username"));
    }

    let value = line[split_at + 1..].trim();
    let stored = value.split(',').next().unwrap_or_default().trim();
    let password = match stored.strip_prefix(OBFUSCATED_PREFIX) {
        Some(encoded) => deobfuscate(encoded)?,
        None => stored.to_string(),
    };
    Ok((username, password))
}

/// Reverse the `OBF:` encoding: each byte is a 4-digit base-36 group,
/// or `U` followed by 4 digits for bytes outside the ASCII range.
pub fn deobfuscate(encoded: &str) -> Result<String, CredentialsError> {
    let chars: Vec<char> = encoded.chars().collect();
    let mut bytes = Vec::with_capacity(chars.len() / 4);
    let mut i = 0;

    while i < chars.len() {
        let wide = chars[i] == 'U';
        if wide {
            i += 1;
        }
        if i + 4 > chars.len() {
            return Err(CredentialsError::Obfuscation("truncated group"));
        }
        let group: String = chars[i..i + 4].iter().collect();
        let value = i64::from_str_radix(&group, 36)
            .map_err(|_| CredentialsError::Obfuscation("non base-36 digit"))?;

        let byte = if wide {
            (value >> 8) as u8
        } else {
            let high = value / 256;
            let low = value % 256;
            ((high + low - 254) / 2) as u8
        };
        bytes.push(byte);
        i += 4;
    }

    String::from_utf8(bytes).map_err(|_| CredentialsError::Obfuscation("not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_entries_and_skips_comments() {
        let store = CredentialStore::parse(
            "# users\n\ncluster: cluster\nadmin = s3cret, admin, ops\n! old style comment\n",
        );

        assert_eq!(store.len(), 2);
        assert!(store.verify("cluster", "cluster"));
        assert!(store.verify("admin", "s3cret"));
        assert!(!store.verify("admin", "admin"));
        assert!(!store.verify("nobody", "cluster"));
    }

    #[test]
    fn decodes_obfuscated_passwords() {
        assert_eq!(deobfuscate("1rpa1rpc").unwrap(), "ab");

        let store = CredentialStore::parse("user: OBF:1rpa1rpc");
        assert!(store.verify("user", "ab"));
    }

    #[test]
    fn skips_bad_lines_and_keeps_the_rest() {
        let store = CredentialStore::parse(
            "cluster cluster\nadmin: s3cret\n: nobody\nbroken: OBF:1rp\nops = ops, ops\n",
        );

        assert_eq!(store.len(), 2);
        assert!(store.verify("admin", "s3cret"));
        assert!(store.verify("ops", "ops"));
        assert!(!store.verify("broken", "OBF:1rp"));
    }

    #[test]
    fn load_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("realm.properties");
        std::fs::write(&path, "no separator here\ncluster: cluster\n").unwrap();

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.verify("cluster", "cluster"));
    }

    #[test]
    fn rejects_truncated_obfuscation() {
        assert!(deobfuscate("1rp").is_err());
    }

    #[test]
    fn debug_output_hides_passwords() {
        let creds = Credentials::new("cluster", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
