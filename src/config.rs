//! TOML configuration with environment overrides.
//!
//! ```toml
//! [workspace]
//! url = "https://adb-123.azuredatabricks.net"
//! space_id = "01f0..."
//! warehouse_id = "df28..."
//!
//! [polling]
//! message_interval_secs = 3
//! message_deadline_secs = 600
//! statement_interval_secs = 1
//! statement_timeout_secs = 30
//!
//! [session]
//! path = ".genie_session.json"
//! ```
//!
//! The access token is normally supplied through `DATABRICKS_TOKEN` rather
//! than written to the file. See [`apply_env`] for the full list of
//! overrides.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub osm: OsmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_message_interval")]
    pub message_interval_secs: u64,
    /// Upper bound for conversation polling. `0` polls until a terminal state.
    #[serde(default = "default_message_deadline")]
    pub message_deadline_secs: u64,
    #[serde(default = "default_statement_interval")]
    pub statement_interval_secs: u64,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            message_interval_secs: default_message_interval(),
            message_deadline_secs: default_message_deadline(),
            statement_interval_secs: default_statement_interval(),
            statement_timeout_secs: default_statement_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_message_interval() -> u64 {
    3
}
fn default_message_deadline() -> u64 {
    600
}
fn default_statement_interval() -> u64 {
    1
}
fn default_statement_timeout() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    30
}

impl PollingConfig {
    pub fn message_interval(&self) -> Duration {
        Duration::from_secs(self.message_interval_secs)
    }

    pub fn message_deadline(&self) -> Option<Duration> {
        match self.message_deadline_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn statement_interval(&self) -> Duration {
        Duration::from_secs(self.statement_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".genie_session.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct OsmConfig {
    #[serde(default = "default_osm_url")]
    pub base_url: String,
}

impl Default for OsmConfig {
    fn default() -> Self {
        Self {
            base_url: default_osm_url(),
        }
    }
}

fn default_osm_url() -> String {
    "https://api.openstreetmap.org".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// All-default configuration, to be completed from the environment.
    pub fn empty() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            polling: PollingConfig::default(),
            session: SessionConfig::default(),
            osm: OsmConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Bearer token; only valid after [`validate`] succeeded.
    pub fn token(&self) -> &str {
        self.workspace.token.as_deref().unwrap_or_default()
    }

    /// Warehouse id required by SQL execution paths.
    pub fn warehouse_id(&self) -> Result<&str> {
        match self.workspace.warehouse_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => bail!(
                "workspace.warehouse_id must be set (or DATABRICKS_WAREHOUSE_ID) to execute SQL"
            ),
        }
    }
}

/// Load the config file (if it exists), apply environment overrides, and
/// validate the result.
///
/// A missing file is not an error: every required value can come from the
/// environment or a `.env` file.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = parse_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Read the config file and apply environment overrides without requiring
/// workspace credentials. Used by commands that never talk to the workspace.
pub fn parse_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!("config file {} not found, using environment", path.display());
        Config::empty()
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Override workspace settings from environment variables.
///
/// | Variable | Field |
/// |----------|-------|
/// | `DATABRICKS_SERVER_HOSTNAME` | `workspace.url` |
/// | `DATABRICKS_TOKEN` | `workspace.token` |
/// | `DATABRICKS_GENIE_SPACE_ID` | `workspace.space_id` |
/// | `DATABRICKS_WAREHOUSE_ID` | `workspace.warehouse_id` |
pub fn apply_env<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(host) = non_empty("DATABRICKS_SERVER_HOSTNAME") {
        config.workspace.url = normalize_host(&host);
    }
    if let Some(token) = non_empty("DATABRICKS_TOKEN") {
        config.workspace.token = Some(token);
    }
    if let Some(space) = non_empty("DATABRICKS_GENIE_SPACE_ID") {
        config.workspace.space_id = space;
    }
    if let Some(warehouse) = non_empty("DATABRICKS_WAREHOUSE_ID") {
        config.workspace.warehouse_id = Some(warehouse);
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

pub fn validate(config: &Config) -> Result<()> {
    let url = config.workspace.url.trim();
    if url.is_empty() {
        bail!("workspace.url must be set (or DATABRICKS_SERVER_HOSTNAME)");
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("workspace.url must start with http:// or https://, got '{}'", url);
    }

    match config.workspace.token.as_deref() {
        Some(t) if !t.trim().is_empty() => {}
        _ => bail!("workspace.token must be set (or DATABRICKS_TOKEN)"),
    }

    if config.workspace.space_id.trim().is_empty() {
        bail!("workspace.space_id must be set (or DATABRICKS_GENIE_SPACE_ID)");
    }

    // Validate polling
    if config.polling.message_interval_secs == 0 {
        bail!("polling.message_interval_secs must be > 0");
    }
    if config.polling.statement_interval_secs == 0 {
        bail!("polling.statement_interval_secs must be > 0");
    }
    if config.polling.statement_timeout_secs == 0 {
        bail!("polling.statement_timeout_secs must be > 0");
    }
    if config.polling.request_timeout_secs == 0 {
        bail!("polling.request_timeout_secs must be > 0");
    }
    let deadline = config.polling.message_deadline_secs;
    if deadline != 0 && deadline < config.polling.message_interval_secs {
        bail!(
            "polling.message_deadline_secs ({}) must be 0 or at least polling.message_interval_secs ({})",
            deadline,
            config.polling.message_interval_secs
        );
    }

    Ok(())
}
