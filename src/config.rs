// ABOUTME: Static configuration loaded once at process start
// ABOUTME: TOML-backed master/slave endpoints and replication tuning knobs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration. Constructed once in `main` and passed by
/// reference into each component constructor; nothing reads it globally.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub master: EndpointConfig,
    pub slave: EndpointConfig,
    /// Database replicated from master to slave.
    pub database: String,
    #[serde(default)]
    pub replication: ReplicationConfig,
}

/// Connection coordinates for one MySQL instance. Read-only at runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
}

fn default_port() -> u16 {
    3306
}

/// Tuning knobs for the shipping loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Seconds to sleep between shipping cycles
    pub cycle_interval_secs: u64,
    /// Wall-clock timeout for each external tool invocation
    pub tool_timeout_secs: u64,
    /// Where the (binlog file, position) checkpoint record lives
    pub checkpoint_path: PathBuf,
    /// Directory for exported segment artifacts and the seed dump
    pub artifact_dir: PathBuf,
    /// Retain applied segment artifacts for audit/replay instead of deleting them
    pub keep_artifacts: bool,
    /// Table whose row count the consistency probe compares
    pub probe_table: String,
    /// Consecutive failed cycles before the loop raises an operator alert
    pub alert_after_failures: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 1,
            tool_timeout_secs: 300,
            checkpoint_path: PathBuf::from(".binlog-replicator/checkpoint"),
            artifact_dir: PathBuf::from(".binlog-replicator/segments"),
            keep_artifacts: false,
            probe_table: "persons".to_string(),
            alert_after_failures: 5,
        }
    }
}

impl ReplicationConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Load and validate configuration from a TOML file.
pub fn load(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    validate_mysql_identifier(&config.database)
        .context("Invalid `database` in configuration")?;
    validate_mysql_identifier(&config.replication.probe_table)
        .context("Invalid `replication.probe_table` in configuration")?;
    Ok(config)
}

/// Validate a MySQL unquoted identifier (database or table name).
///
/// Names from the config end up inside SQL statements and tool argument
/// vectors, so they must stay within MySQL's unquoted identifier rules:
/// 1-64 characters from [A-Za-z0-9_$], not all digits.
pub fn validate_mysql_identifier(identifier: &str) -> Result<()> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        bail!("Identifier cannot be empty or whitespace-only");
    }

    if trimmed.len() > 64 {
        bail!(
            "Identifier '{}' exceeds maximum length of 64 characters (got {})",
            trimmed,
            trimmed.len()
        );
    }

    if let Some(bad) = trimmed
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '$')
    {
        bail!(
            "Identifier '{}' contains invalid character '{}' (allowed: letters, digits, _, $)",
            trimmed,
            bad
        );
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        bail!("Identifier '{}' cannot consist solely of digits", trimmed);
    }

    Ok(())
}
