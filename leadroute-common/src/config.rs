//! Bootstrap configuration loading
//!
//! Configuration is a single TOML file plus environment overrides.
//! File resolution priority:
//! 1. Explicit path (command-line `--config`)
//! 2. `LEADROUTE_CONFIG` environment variable
//! 3. `~/.config/leadroute/config.toml`, then `/etc/leadroute/config.toml`
//! 4. Compiled defaults (a missing file is not fatal)
//!
//! An explicitly requested file that is missing or unparsable IS fatal.
//! Secrets (Sheets token) are expected to come from the environment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "LEADROUTE_CONFIG";
pub const DB_PATH_ENV_VAR: &str = "LEADROUTE_DB_PATH";
pub const SHEETS_TOKEN_ENV_VAR: &str = "LEADROUTE_SHEETS_TOKEN";
pub const SOURCE_SPREADSHEET_ENV_VAR: &str = "LEADROUTE_SOURCE_SPREADSHEET_ID";
pub const SOURCE_SHEET_ENV_VAR: &str = "LEADROUTE_SOURCE_SHEET_NAME";

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    pub logging: LoggingConfig,

    /// Outbound HTTP settings shared by every channel
    pub http: HttpConfig,

    /// Tabular lead source (absent: `process-data` has nothing to scan)
    pub source: Option<SourceConfig>,

    /// Google Sheets API access, used by the source and the sheet channel
    pub sheets: SheetsConfig,

    /// Fixed CRM account receiving override-routed tags
    pub fixed_crm: Option<FixedCrmConfig>,

    pub daemon: DaemonConfig,

    /// Push endpoint listener
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound on every outbound call
    pub timeout_secs: u64,

    /// Timeout for destination probes made by `add-client`
    pub probe_timeout_secs: u64,

    /// `source` marker sent in CRM webhook payloads
    pub source_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Sheets v4 REST base URL
    pub api_base: String,

    /// OAuth bearer token; normally provided via `LEADROUTE_SHEETS_TOKEN`
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedCrmConfig {
    /// REST endpoint creating the contact (step 1)
    pub contact_url: String,

    /// REST endpoint creating the deal bound to the contact (step 2)
    pub deal_url: String,

    /// Tags matching this regex go exclusively to the fixed CRM
    pub tag_pattern: String,

    #[serde(default = "default_assigned_by_id")]
    pub assigned_by_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub interval_minutes: u64,

    /// Pause after a tick that failed unexpectedly
    pub failure_cooldown_secs: u64,

    /// Run a retry sweep after every source scan
    pub retry_sweep: bool,

    /// Attempt bound used by the sweep and as `retry-delivery` default
    pub max_attempts: i64,

    /// Pause between source rows
    pub row_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn default_assigned_by_id() -> i64 {
    1
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            source: None,
            sheets: SheetsConfig::default(),
            fixed_crm: None,
            daemon: DaemonConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            probe_timeout_secs: 5,
            source_marker: "LeadRoute".to_string(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com/v4".to_string(),
            access_token: None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 10,
            failure_cooldown_secs: 60,
            retry_sweep: true,
            max_attempts: 3,
            row_pause_ms: 200,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl TomlConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve, load and apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => match find_config_file() {
                Some(path) => {
                    info!("Loading configuration from {}", path.display());
                    Self::from_file(&path)?
                }
                None => {
                    warn!("No configuration file found, using built-in defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables take precedence over file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(DB_PATH_ENV_VAR) {
            if !path.trim().is_empty() {
                self.database_path = PathBuf::from(path);
            }
        }

        if let Ok(token) = std::env::var(SHEETS_TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                self.sheets.access_token = Some(token);
            }
        }

        let spreadsheet = std::env::var(SOURCE_SPREADSHEET_ENV_VAR).ok();
        let sheet = std::env::var(SOURCE_SHEET_ENV_VAR).ok();
        match (spreadsheet, sheet, self.source.as_mut()) {
            (Some(id), Some(name), None) => {
                self.source = Some(SourceConfig {
                    spreadsheet_id: id,
                    sheet_name: name,
                });
            }
            (id, name, Some(source)) => {
                if let Some(id) = id {
                    source.spreadsheet_id = id;
                }
                if let Some(name) = name {
                    source.sheet_name = name;
                }
            }
            _ => {}
        }
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http.timeout_secs.max(1))
    }
}

/// First existing file among the per-user and system-wide locations
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("leadroute").join("config.toml"));
    let system_config = PathBuf::from("/etc/leadroute/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|p| p.exists())
}

/// `~/.local/share/leadroute/leads.db` (or `./database/leads.db` without a home)
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("leadroute").join("leads.db"))
        .unwrap_or_else(|| PathBuf::from("database").join("leads.db"))
}
