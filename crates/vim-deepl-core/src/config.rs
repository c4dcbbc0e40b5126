//! Environment configuration
//!
//! Configuration is loaded ONLY here, once, at process start. Everything else
//! receives a `Config` (or a piece of it) by injection.

use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;

/// Configuration error - fatal at startup, the process exits 1.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value that does not parse as an integer
    #[error("env {name} must be an integer, got {value:?}")]
    InvalidInt { name: &'static str, value: String },
    /// No home directory to derive the default data dir from
    #[error("could not determine a home directory for the data dir")]
    NoHomeDir,
    /// Data/log directory could not be created
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Trainer tunables (see `TrainerService`)
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Entries younger than this many days count as "recent"
    pub recent_days: i64,
    /// Review count at which an entry counts as mastered (progress display only)
    pub mastery_count: i64,
    /// Probability of drawing from the recent bucket when both buckets are non-empty
    pub recent_ratio: f64,
    /// Probability of trying the new-card pool before the hard pool
    pub srs_new_ratio: f64,
    /// Hard pool is sampled from this many hardest cards
    pub hard_random_top_n: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            recent_days: 7,
            mastery_count: 7,
            recent_ratio: 0.7,
            srs_new_ratio: 0.2,
            hard_random_top_n: 5,
        }
    }
}

/// Process-wide configuration, resolved from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base data directory (`VIM_DEEPL_DATA_DIR`)
    pub data_dir: PathBuf,
    /// SQLite database file (`VIM_DEEPL_DB_PATH`)
    pub db_path: PathBuf,
    /// Log file (`VIM_DEEPL_LOG_PATH`)
    pub log_path: PathBuf,
    /// Log level filter (`VIM_DEEPL_LOG_LEVEL`)
    pub log_level: String,
    /// DeepL API key (`DEEPL_API_KEY`); absent key surfaces as a provider error
    pub deepl_api_key: Option<String>,
    /// Merriam-Webster sd3 API key (`MW_SD3_API_KEY`)
    pub mw_api_key: Option<String>,
    /// Upstream HTTP timeout (`VIM_DEEPL_HTTP_TIMEOUT_SEC`)
    pub http_timeout: Duration,
    /// Listen host (`VIM_DEEPL_HTTP_HOST`)
    pub http_host: String,
    /// Listen port (`VIM_DEEPL_HTTP_PORT`)
    pub http_port: u16,
    /// Trainer tunables
    pub trainer: TrainerConfig,
}

fn env_trimmed(name: &str) -> Option<String> {
    let val = std::env::var(name).ok()?;
    let val = val.trim();
    if val.is_empty() { None } else { Some(val.to_string()) }
}

fn parse_int<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidInt { name, value }),
    }
}

fn create_dir(path: &std::path::Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Load configuration from the environment, creating the data directory
    /// and the parents of the database and log paths.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = match env_trimmed("VIM_DEEPL_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let base = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
                base.data_dir().join("vim-deepl")
            }
        };

        let db_path = env_trimmed("VIM_DEEPL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("vocab.db"));

        let log_path = env_trimmed("VIM_DEEPL_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("vim-deepl.log"));

        let log_level = env_trimmed("VIM_DEEPL_LOG_LEVEL")
            .unwrap_or_else(|| "INFO".to_string())
            .to_uppercase();

        let timeout_sec: u64 = parse_int(
            "VIM_DEEPL_HTTP_TIMEOUT_SEC",
            env_trimmed("VIM_DEEPL_HTTP_TIMEOUT_SEC"),
            25,
        )?;

        let http_host =
            env_trimmed("VIM_DEEPL_HTTP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let http_port: u16 = parse_int(
            "VIM_DEEPL_HTTP_PORT",
            env_trimmed("VIM_DEEPL_HTTP_PORT"),
            8787,
        )?;

        create_dir(&data_dir)?;
        if let Some(parent) = db_path.parent() {
            create_dir(parent)?;
        }
        if let Some(parent) = log_path.parent() {
            create_dir(parent)?;
        }

        Ok(Self {
            data_dir,
            db_path,
            log_path,
            log_level,
            deepl_api_key: env_trimmed("DEEPL_API_KEY"),
            mw_api_key: env_trimmed("MW_SD3_API_KEY"),
            http_timeout: Duration::from_secs(timeout_sec),
            http_host,
            http_port,
            trainer: TrainerConfig::default(),
        })
    }

    /// Audio cache directory: `<data_dir>/mw_audio`
    pub fn audio_cache_dir(&self) -> PathBuf {
        self.data_dir.join("mw_audio")
    }
}
