//! Environment files for the Kitty Items launcher
//!
//! This crate locates the per-network `.env.*` file, parses dotenv files into
//! an ordered [`EnvironmentConfig`], merges generated credentials over a
//! template and writes the result back to disk.

use flow::NetworkMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const EMULATOR_ENV_FILE: &str = ".env.emulator";
pub const TESTNET_ENV_FILE: &str = ".env.testnet";
pub const TESTNET_TEMPLATE_FILE: &str = ".env.testnet.template";

/// Errors related to environment files
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("{message} (expected at {})", .path.display())]
    MissingConfig { path: PathBuf, message: String },
    #[error("Failed to parse environment file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type EnvResult<T> = Result<T, EnvError>;

/// Path of the environment file a session on `network` loads.
///
/// The testnet file is created by the account bootstrap step (or by hand), so
/// its absence is reported as missing configuration.
pub fn resolve_env_path(root: &Path, network: NetworkMode) -> EnvResult<PathBuf> {
    match network {
        NetworkMode::Emulator => Ok(root.join(EMULATOR_ENV_FILE)),
        NetworkMode::Testnet => {
            let path = root.join(TESTNET_ENV_FILE);
            if !path.exists() {
                return Err(EnvError::MissingConfig {
                    path,
                    message: "Testnet deployment config not created. See README.md for instructions."
                        .to_string(),
                });
            }
            Ok(path)
        }
    }
}

/// Ordered key/value pairs of a dotenv file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    entries: Vec<(String, String)>,
}

impl EnvironmentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a dotenv file
    pub fn load(path: &Path) -> EnvResult<Self> {
        let contents = fs::read(path).map_err(|source| EnvError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents, path)?;
        debug!(path = %path.display(), entries = config.len(), "loaded environment file");
        Ok(config)
    }

    /// Parse dotenv contents; `origin` only labels errors
    pub fn parse(contents: &[u8], origin: &Path) -> EnvResult<Self> {
        let mut config = Self::new();
        for item in dotenvy::from_read_iter(contents) {
            let (key, value) = item.map_err(|source| EnvError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
            config.insert(key, value);
        }
        Ok(config)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key`, replacing an existing value in place or appending
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Overlay `other` on top of `self`; values from `other` win
    pub fn merged<I, K, V>(mut self, other: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in other {
            self.insert(key, value);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as dotenv text, one `KEY=value` line per entry
    pub fn to_env_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(&quote_value(value));
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path) -> EnvResult<()> {
        fs::write(path, self.to_env_string()).map_err(|source| EnvError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), entries = self.len(), "wrote environment file");
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentConfig {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::new().merged(iter)
    }
}

fn is_plain(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@+,=".contains(c))
}

// dotenvy substitutes `$VAR` outside single quotes, so anything beyond the
// plain charset gets quoted.
fn quote_value(value: &str) -> String {
    if is_plain(value) {
        value.to_string()
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('$', "\\$");
        format!("\"{escaped}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_emulator_path_without_file() {
        let dir = TempDir::new().unwrap();
        let path = resolve_env_path(dir.path(), NetworkMode::Emulator).unwrap();
        assert_eq!(path, dir.path().join(".env.emulator"));
    }

    #[test]
    fn test_resolve_testnet_requires_file() {
        let dir = TempDir::new().unwrap();
        let err = resolve_env_path(dir.path(), NetworkMode::Testnet).unwrap_err();
        assert!(matches!(err, EnvError::MissingConfig { .. }));
        assert!(err.to_string().contains("README.md"));

        fs::write(dir.path().join(".env.testnet"), "ADMIN_ADDRESS=0x01\n").unwrap();
        let path = resolve_env_path(dir.path(), NetworkMode::Testnet).unwrap();
        assert_eq!(path, dir.path().join(".env.testnet"));
    }

    #[test]
    fn test_parse_keeps_order() {
        let contents = b"# comment\nCHAIN_ENV=testnet\nACCESS_API=https://rest-testnet.onflow.org\nADMIN_ADDRESS=\n";
        let config = EnvironmentConfig::parse(contents, Path::new(".env")).unwrap();
        let keys: Vec<_> = config.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["CHAIN_ENV", "ACCESS_API", "ADMIN_ADDRESS"]);
        assert_eq!(config.get("ADMIN_ADDRESS"), Some(""));
    }

    #[test]
    fn test_merge_overrides_in_place_and_appends() {
        let template: EnvironmentConfig =
            [("CHAIN_ENV", "testnet"), ("ADMIN_ADDRESS", "")].into_iter().collect();
        let merged = template.merged([
            ("ADMIN_ADDRESS", "0x1234"),
            ("FLOW_PRIVATE_KEY", "abcd"),
        ]);

        assert_eq!(
            merged.to_env_string(),
            "CHAIN_ENV=testnet\nADMIN_ADDRESS=0x1234\nFLOW_PRIVATE_KEY=abcd\n"
        );
    }

    #[test]
    fn test_written_values_parse_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env.testnet");
        let config: EnvironmentConfig = [
            ("PLAIN", "https://example.org/a"),
            ("SPACED", "two words # not a comment"),
            ("EMPTY", ""),
        ]
        .into_iter()
        .collect();

        config.write(&path).unwrap();
        let loaded = EnvironmentConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = EnvironmentConfig::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EnvError::Io { .. }));
    }
}
