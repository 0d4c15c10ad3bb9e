//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Anything that can be
//! given on the command line overrides the file; see `resolve_root_folder`
//! for the priority order used for the data folder.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "PHISHPAIR_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "phishpair.db";

/// Default number of pairs shown to each participant
pub const DEFAULT_NUM_PAIRS: usize = 10;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub survey: SurveyConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// API key used by the offline labeler
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Survey settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Directory containing the stimulus emails
    #[serde(default = "default_emails_dir")]
    pub emails_dir: PathBuf,

    /// Pairs per session
    #[serde(default = "default_num_pairs")]
    pub num_pairs: usize,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            emails_dir: default_emails_dir(),
            num_pairs: default_num_pairs(),
        }
    }
}

/// Which storage adapter backs responses and sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!(
                "Unknown storage backend '{}' (expected 'sqlite' or 'memory')",
                other
            ))),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_emails_dir() -> PathBuf {
    PathBuf::from("emails")
}

fn default_num_pairs() -> usize {
    DEFAULT_NUM_PAIRS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the survey cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.survey.num_pairs == 0 {
            return Err(Error::Config("survey.num_pairs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Load bootstrap configuration
///
/// An explicitly given path must exist. Without one, the platform config
/// file is used when present, otherwise built-in defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(TomlConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    TomlConfig::from_toml_str(&content)
}

/// Platform config file location (`<config dir>/phishpair/phishpair.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("phishpair").join("phishpair.toml"))
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("phishpair"))
        .unwrap_or_else(|| PathBuf::from("./phishpair_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 5780);
        assert_eq!(config.survey.num_pairs, DEFAULT_NUM_PAIRS);
        assert_eq!(config.survey.emails_dir, PathBuf::from("emails"));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            root_folder = "/srv/phishpair"

            [server]
            port = 8080

            [survey]
            emails_dir = "/srv/emails"
            num_pairs = 4

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/phishpair")));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.survey.num_pairs, 4);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_zero_pairs_rejected() {
        let err = TomlConfig::from_toml_str("[survey]\nnum_pairs = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(TomlConfig::from_toml_str("[storage]\nbackend = \"odbc\"\n").is_err());
        assert!("odbc".parse::<StorageBackend>().is_err());
        assert_eq!("SQLite".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
    }

    #[test]
    fn test_cli_argument_wins() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(
            Some(Path::new("/from/cli")),
            "PHISHPAIR_TEST_UNSET_VARIABLE",
            &config,
        );
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_toml_used_without_cli_or_env() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(None, "PHISHPAIR_TEST_UNSET_VARIABLE", &config);
        assert_eq!(resolved, PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_database_path_in_root() {
        assert_eq!(
            database_path(Path::new("/data")),
            PathBuf::from("/data/phishpair.db")
        );
    }
}
