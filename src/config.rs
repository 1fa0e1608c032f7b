use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::todo::ListOrder;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub file: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub server: Server,
    pub database: Database,
    #[serde(default)]
    pub listing: ListOrder,
}

const DEFAULT_CONFIG: &str = r#"
[server]
bind="127.0.0.1:8000"

[database]
file="ticklist.db"

[listing]
# How priorities rank: "severity" (urgent > high > medium > low)
# or "lexical" (by stored code, descending).
priority_order="severity"
# Where todos without a due date go: "last" or "first".
undated="last"

"#;

impl Configuration {
    /// Loads `~/.config/ticklist/ticklist.toml`, writing the defaults there
    /// first if it does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = default_path()?;
        if !config_path.exists() {
            write_default(&config_path)?;
        }
        Self::from_file(&config_path)
    }

    /// Defaults, then `path`, then `TICKLIST_*` environment variables.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path).required(true))
            .add_source(env)
            .build()?
            .try_deserialize::<Configuration>()
    }
}

/// `TICKLIST_SERVER__BIND` sets `server.bind`.
fn environment() -> Environment {
    Environment::with_prefix("TICKLIST")
        .prefix_separator("_")
        .separator("__")
}

fn default_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".config/ticklist/ticklist.toml"))
        .ok_or_else(|| ConfigError::Message("Couldn't locate the home directory".to_string()))
}

fn write_default(config_path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
    }
    fs::write(config_path, DEFAULT_CONFIG.trim()).map_err(|e| ConfigError::Foreign(Box::new(e)))
}
