//! Storage configuration
//!
//! Decides which backend to open and where the data lives. Resolution order
//! for the backend is: explicit flag, `MANGA_STORAGE`, the `storage:` key of
//! `<data_dir>/config.yaml`, then the text backend. Reading the config file
//! never creates it.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const STORAGE_ENV_VAR: &str = "MANGA_STORAGE";
pub const DATA_DIR_ENV_VAR: &str = "MANGA_LIBRARY_DIR";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
const DEFAULT_DATA_DIR_NAME: &str = ".manga_library";

/// Which persistence engine backs the collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// One CSV file per collection
    #[default]
    #[serde(rename = "text", alias = "csv")]
    Text,
    /// Single SQLite database file
    #[serde(rename = "relational", alias = "sqlite")]
    Relational,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Text => "text",
            BackendKind::Relational => "relational",
        }
    }

    /// Whether this build can open the backend
    pub fn engine_available(&self) -> bool {
        match self {
            BackendKind::Text => true,
            BackendKind::Relational => cfg!(feature = "sqlite"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "csv" => Ok(BackendKind::Text),
            "relational" | "sqlite" => Ok(BackendKind::Relational),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown storage backend '{0}', expected 'text' (csv) or 'relational' (sqlite)")]
    UnknownBackend(String),

    #[error("could not determine the home directory, pass --data-dir or set MANGA_LIBRARY_DIR")]
    NoHomeDirectory,

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Contents of the optional `config.yaml`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    storage: Option<String>,
}

/// Resolved storage settings handed to `CollectionService::open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(backend: BackendKind, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            data_dir: data_dir.into(),
        }
    }

    /// Resolve from the command line and the process environment
    pub fn resolve(flag: Option<&str>, data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir(std::env::var_os(DATA_DIR_ENV_VAR).map(PathBuf::from))?,
        };
        let env_value = std::env::var(STORAGE_ENV_VAR).ok();
        Self::resolve_from(flag, env_value.as_deref(), data_dir)
    }

    /// Resolution with the environment passed in, so it can be tested
    pub fn resolve_from(
        flag: Option<&str>,
        env_value: Option<&str>,
        data_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        let selector = match non_empty(flag).or_else(|| non_empty(env_value)) {
            Some(value) => Some(value.to_string()),
            None => read_config_file(&data_dir)?.storage,
        };

        let backend = match selector {
            Some(value) => value.parse()?,
            None => BackendKind::default(),
        };
        debug!(
            "Resolved storage backend '{}' for {}",
            backend,
            data_dir.display()
        );

        Ok(Self { backend, data_dir })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn default_data_dir(from_env: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = from_env.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_DATA_DIR_NAME))
        .ok_or(ConfigError::NoHomeDirectory)
}

fn read_config_file(data_dir: &Path) -> Result<ConfigFile, ConfigError> {
    let path = data_dir.join(CONFIG_FILE_NAME);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Invalid { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backend_aliases() {
        assert_eq!("text".parse::<BackendKind>().unwrap(), BackendKind::Text);
        assert_eq!("CSV".parse::<BackendKind>().unwrap(), BackendKind::Text);
        assert_eq!(" sqlite ".parse::<BackendKind>().unwrap(), BackendKind::Relational);
        assert_eq!("Relational".parse::<BackendKind>().unwrap(), BackendKind::Relational);
        assert!(matches!(
            "postgres".parse::<BackendKind>(),
            Err(ConfigError::UnknownBackend(v)) if v == "postgres"
        ));
    }

    #[test]
    fn test_default_is_text() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::resolve_from(None, None, temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(config.backend, BackendKind::Text);
        // Resolution never writes a config file
        assert!(!temp_dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_flag_beats_env_beats_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        std::fs::write(dir.join(CONFIG_FILE_NAME), "storage: sqlite\n").unwrap();

        let from_file = StorageConfig::resolve_from(None, None, dir.clone()).unwrap();
        assert_eq!(from_file.backend, BackendKind::Relational);

        let from_env = StorageConfig::resolve_from(None, Some("csv"), dir.clone()).unwrap();
        assert_eq!(from_env.backend, BackendKind::Text);

        let from_flag = StorageConfig::resolve_from(Some("relational"), Some("csv"), dir).unwrap();
        assert_eq!(from_flag.backend, BackendKind::Relational);
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            StorageConfig::resolve_from(None, Some("  "), temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(config.backend, BackendKind::Text);
    }

    #[test]
    fn test_unknown_value_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = StorageConfig::resolve_from(Some("mongo"), None, temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::UnknownBackend(_))));
    }

    #[test]
    fn test_malformed_config_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "storage: [unclosed\n").unwrap();
        let result = StorageConfig::resolve_from(None, None, temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_data_dir_env_override() {
        let dir = default_data_dir(Some(PathBuf::from("/srv/manga"))).unwrap();
        assert_eq!(dir, PathBuf::from("/srv/manga"));
    }

    #[test]
    fn test_serde_names() {
        let kind: BackendKind = serde_yaml::from_str("sqlite").unwrap();
        assert_eq!(kind, BackendKind::Relational);
        assert_eq!(serde_yaml::to_string(&BackendKind::Text).unwrap().trim(), "text");
    }
}
