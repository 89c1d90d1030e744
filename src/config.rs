use std::str::FromStr;

use serde::Deserialize;

use crate::ports::{BASE_URL_SETTING, REPLY_ADDRESS_SETTING, Settings};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub hosts: HostsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
}

fn default_max_pool_size() -> u32 {
    5
}

/// Mail settings. Both are optional here; a missing base URL fails the send, not the load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    /// Web UI base URL for links in mail (setting `foreman_url`).
    pub base_url: Option<String>,
    /// Reply-from address (setting `email_reply_address`).
    pub reply_address: Option<String>,
}

impl Settings for MailConfig {
    fn setting(&self, key: &str) -> Option<String> {
        match key {
            BASE_URL_SETTING => self.base_url.clone(),
            REPLY_ADDRESS_SETTING => self.reply_address.clone(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional cron expression (sec min hour dom mon dow), e.g. "0 0 7 * * *". Uses local time.
    pub schedule: Option<String>,
    /// Send every N seconds when schedule is not set.
    #[serde(default = "default_summary_interval_secs")]
    pub interval_secs: u64,
    /// Length of the summarized window.
    #[serde(default = "default_since_hours")]
    pub since_hours: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: None,
            interval_secs: default_summary_interval_secs(),
            since_hours: default_since_hours(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_summary_interval_secs() -> u64 {
    86_400
}

fn default_since_hours() -> u32 {
    24
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostsConfig {
    /// Enabled hosts without a report for this long are listed as out of sync.
    #[serde(default = "default_out_of_sync_minutes")]
    pub out_of_sync_minutes: u32,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            out_of_sync_minutes: default_out_of_sync_minutes(),
        }
    }
}

fn default_out_of_sync_minutes() -> u32 {
    30
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.summary.interval_secs > 0,
            "summary.interval_secs must be > 0, got {}",
            self.summary.interval_secs
        );
        anyhow::ensure!(
            self.summary.since_hours > 0,
            "summary.since_hours must be > 0, got {}",
            self.summary.since_hours
        );
        if let Some(ref schedule) = self.summary.schedule {
            cron::Schedule::from_str(schedule).map_err(|e| {
                anyhow::anyhow!("summary.schedule is not a valid cron expression: {}", e)
            })?;
        }
        anyhow::ensure!(
            self.hosts.out_of_sync_minutes > 0,
            "hosts.out_of_sync_minutes must be > 0, got {}",
            self.hosts.out_of_sync_minutes
        );
        Ok(())
    }
}
