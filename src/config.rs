//! JSON configuration file.
//!
//! The file names the cube's port, the IMAP server and account, the
//! mailbox to watch and the two unread-count thresholds:
//!
//! ```json
//! {
//!   "cube": "/dev/ttyACM0",
//!   "addr": "imap.gmail.com:993",
//!   "username": "me@example.com",
//!   "password": "app-password",
//!   "label": "INBOX",
//!   "green-if-more": 0,
//!   "red-if-more": 10
//! }
//! ```
//!
//! ## Rust concepts
//! - `serde` derive with `rename_all` for kebab-case keys
//! - `thiserror` for an error enum that keeps the failing path
//! - A hand-written `Debug` impl to keep secrets out of logs

use crate::signal::Thresholds;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "cube-gmail.json";

/// Errors produced while loading the configuration. Both are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to open config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Process configuration, immutable once loaded.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Serial port of the cube, e.g. `/dev/ttyACM0` or `COM3`.
    pub cube: String,
    /// IMAP server as `host:port`. Port 993 means implicit TLS.
    pub addr: String,
    pub username: String,
    pub password: String,
    /// Mailbox to watch.
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub green_if_more: u32,
    #[serde(default)]
    pub red_if_more: u32,
}

fn default_label() -> String {
    "INBOX".to_string()
}

impl Config {
    /// Read and parse the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.green_if_more, self.red_if_more)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cube", &self.cube)
            .field("addr", &self.addr)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("label", &self.label)
            .field("green_if_more", &self.green_if_more)
            .field("red_if_more", &self.red_if_more)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const FULL: &str = r#"{
        "cube": "/dev/ttyACM0",
        "addr": "imap.example.com:993",
        "username": "alice",
        "password": "hunter2",
        "label": "Work",
        "green-if-more": 0,
        "red-if-more": 10
    }"#;

    #[test]
    fn parses_kebab_case_keys() {
        let config = Config::from_json(FULL).unwrap();
        assert_eq!(config.cube, "/dev/ttyACM0");
        assert_eq!(config.addr, "imap.example.com:993");
        assert_eq!(config.username, "alice");
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.label, "Work");
        assert_eq!(config.thresholds(), Thresholds::new(0, 10));
    }

    #[test]
    fn label_and_thresholds_have_defaults() {
        let config = Config::from_json(
            r#"{"cube": "COM3", "addr": "mail:143", "username": "u", "password": "p"}"#,
        )
        .unwrap();
        assert_eq!(config.label, "INBOX");
        assert_eq!(config.thresholds(), Thresholds::new(0, 0));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert!(Config::from_json(r#"{"cube": "COM3"}"#).is_err());
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let raw = FULL.replace("\"red-if-more\": 10", "\"red-if-more\": -1");
        assert!(Config::from_json(&raw).is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::from_json(FULL).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("alice"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::from_json(FULL).unwrap());
    }

    #[test]
    fn load_missing_file_reports_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn load_malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("malformed config file"));
    }
}
