use crate::constants::*;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Runtime configuration, built once at process start and passed by reference
/// into every stage.
///
/// Resolution order: built-in defaults, then the TOML file, then environment
/// variables (after `.env` is loaded), then CLI flags applied by the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub store: StoreConfig,
    pub load: LoadConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Overrides `<data_dir>/Superstore.csv`
    pub raw_file: Option<PathBuf>,
    /// Overrides `<output_dir>/cleaned_superstore.csv`
    pub cleaned_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            raw_file: None,
            cleaned_file: None,
        }
    }
}

/// Store connection parameters.
///
/// The store is an embedded SQLite database: `database` names the file
/// `<dir>/<database>.db` and `dir` defaults to the output directory.
/// `host`, `user` and `password` are kept so a networked store can be
/// configured the same way; the embedded store only logs them.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: DEFAULT_DB_PASSWORD.to_string(),
            database: DEFAULT_DB_NAME.to_string(),
            dir: None,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("dir", &self.dir)
            .finish()
    }
}

/// What a load does with rows already in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Every run appends; re-running without clearing duplicates rows.
    #[default]
    Append,
    /// Existing rows are deleted in the same transaction as the inserts.
    Replace,
}

impl FromStr for LoadMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(LoadMode::Append),
            "replace" => Ok(LoadMode::Replace),
            other => Err(PipelineError::Config(format!(
                "unknown load mode '{other}' (expected 'append' or 'replace')"
            ))),
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Append => write!(f, "append"),
            LoadMode::Replace => write!(f, "replace"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub mode: LoadMode,
    /// Also persist Year, Month and Profit_Ratio in the store.
    pub persist_derived: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceEncoding {
    #[default]
    Latin1,
    Utf8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub encoding: SourceEncoding,
}

impl PipelineConfig {
    /// Load configuration from an explicit TOML file, or from `pipeline.toml`
    /// when present, then apply `.env` and process environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        info!(store = ?config.store, load_mode = %config.load.mode, "Configuration resolved");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` so tests can supply their
    /// own variables without touching the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_DB_HOST) {
            self.store.host = v;
        }
        if let Some(v) = non_empty(ENV_DB_USER) {
            self.store.user = v;
        }
        // An empty password is a legitimate value
        if let Some(v) = lookup(ENV_DB_PASSWORD) {
            self.store.password = v;
        }
        if let Some(v) = non_empty(ENV_DB_NAME) {
            self.store.database = v;
        }
        if let Some(v) = non_empty(ENV_DATA_DIR) {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(ENV_OUTPUT_DIR) {
            self.paths.output_dir = PathBuf::from(v);
        }
    }

    pub fn raw_file(&self) -> PathBuf {
        self.paths
            .raw_file
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join(RAW_FILE_NAME))
    }

    pub fn cleaned_file(&self) -> PathBuf {
        self.paths
            .cleaned_file
            .clone()
            .unwrap_or_else(|| self.paths.output_dir.join(CLEANED_FILE_NAME))
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store
            .dir
            .clone()
            .unwrap_or_else(|| self.paths.output_dir.clone())
    }

    /// File backing the configured database.
    pub fn database_path(&self) -> PathBuf {
        self.store_dir().join(format!("{}.db", self.store.database))
    }
}
