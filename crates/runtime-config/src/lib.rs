//! Shared monitor/CLI configuration types.
//!
//! Both `tablewatch-monitor` and the `tablewatch` CLI read `tablewatch.toml`
//! using these types. Path resolution and in-place editing live in the CLI.

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "tablewatch.toml";

/// Upper bound for the scan refresh interval (one day).
pub const MAX_SCAN_REFRESH_INTERVAL_SECS: u64 = 86_400;

/// Top-level configuration (persisted as `tablewatch.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default)]
    pub cluster_id: String,
    /// Fixed-interval scan refresh in seconds; 0 disables it.
    #[serde(default)]
    pub scan_refresh_interval_secs: u64,
    #[serde(default = "default_archive_history_limit")]
    pub archive_history_limit: usize,
    /// Raw status forwarded to the scan endpoint; empty means no filter.
    #[serde(default)]
    pub scan_status_filter: String,
    #[serde(default = "default_true")]
    pub extract_log_summaries: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            cluster_id: String::new(),
            scan_refresh_interval_secs: 0,
            archive_history_limit: default_archive_history_limit(),
            scan_status_filter: String::new(),
            extract_log_summaries: true,
        }
    }
}

impl MonitorSettings {
    pub fn scan_status_filter(&self) -> Option<&str> {
        let trimmed = self.scan_status_filter.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_archive_history_limit() -> usize {
    50
}
fn default_max_retries() -> u32 {
    2
}

/// Apply compatibility fallbacks after loading raw TOML.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut RuntimeConfig) -> bool {
    let mut changed = false;

    if config.server.url.trim().is_empty() {
        config.server.url = default_server_url();
        changed = true;
    }

    if config.server.timeout_secs == 0 {
        config.server.timeout_secs = default_timeout_secs();
        changed = true;
    }

    if config.monitor.scan_refresh_interval_secs > MAX_SCAN_REFRESH_INTERVAL_SECS {
        config.monitor.scan_refresh_interval_secs = MAX_SCAN_REFRESH_INTERVAL_SECS;
        changed = true;
    }

    if config.monitor.archive_history_limit == 0 {
        config.monitor.archive_history_limit = default_archive_history_limit();
        changed = true;
    }

    changed
}
