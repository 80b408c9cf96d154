use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tablewatch_runtime_config::{CONFIG_FILE_NAME, RuntimeConfig, apply_compat_fallbacks};

/// Values persisted by `tablewatch config`.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub server: Option<String>,
    pub api_key: Option<String>,
    pub cluster: Option<String>,
    pub scan_interval: Option<u64>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.server.is_none()
            && self.api_key.is_none()
            && self.cluster.is_none()
            && self.scan_interval.is_none()
    }
}

/// Get the config directory path (~/.config/tablewatch/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("tablewatch"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

fn read_config_doc(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let doc = toml::from_str::<toml::Value>(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    Ok(doc)
}

fn ensure_root_table(doc: &mut toml::Value) -> &mut toml::map::Map<String, toml::Value> {
    if !doc.is_table() {
        *doc = toml::Value::Table(toml::map::Map::new());
    }
    doc.as_table_mut().expect("toml root table")
}

fn ensure_child_table<'a>(
    parent: &'a mut toml::map::Map<String, toml::Value>,
    key: &str,
) -> &'a mut toml::map::Map<String, toml::Value> {
    let entry = parent
        .entry(key.to_string())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if !entry.is_table() {
        *entry = toml::Value::Table(toml::map::Map::new());
    }
    entry.as_table_mut().expect("toml child table")
}

fn set_value(doc: &mut toml::Value, section: &str, key: &str, value: toml::Value) {
    let root = ensure_root_table(doc);
    ensure_child_table(root, section).insert(key.to_string(), value);
}

/// Write the update into the document, leaving unrelated keys untouched.
fn apply_update(doc: &mut toml::Value, update: &ConfigUpdate) {
    if let Some(url) = &update.server {
        set_value(doc, "server", "url", toml::Value::String(url.clone()));
    }
    if let Some(key) = &update.api_key {
        set_value(doc, "server", "api_key", toml::Value::String(key.clone()));
    }
    if let Some(cluster) = &update.cluster {
        set_value(
            doc,
            "monitor",
            "cluster_id",
            toml::Value::String(cluster.clone()),
        );
    }
    if let Some(secs) = update.scan_interval {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        set_value(
            doc,
            "monitor",
            "scan_refresh_interval_secs",
            toml::Value::Integer(secs),
        );
    }
}

fn config_from_doc(doc: &toml::Value) -> Result<RuntimeConfig> {
    let mut config = doc
        .clone()
        .try_into::<RuntimeConfig>()
        .context("Invalid tablewatch config")?;
    apply_compat_fallbacks(&mut config);
    Ok(config)
}

/// Load config from disk, returning defaults if the file does not exist.
pub fn load_config() -> Result<RuntimeConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(RuntimeConfig::default());
    }
    let doc = read_config_doc(&path)?;
    config_from_doc(&doc).with_context(|| format!("Invalid config at {}", path.display()))
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "(not set)".to_string()
    } else {
        let visible: String = secret.chars().take(8).collect();
        format!("{visible}...")
    }
}

fn or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Print current config.
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let path = config_path()?;
    println!("Config file: {}", path.display());
    println!();
    println!("[server]");
    println!("  url          = {}", config.server.url);
    println!("  api_key      = {}", mask_secret(&config.server.api_key));
    println!("  timeout_secs = {}", config.server.timeout_secs);
    println!();
    println!("[monitor]");
    println!("  cluster_id                 = {}", or_unset(&config.monitor.cluster_id));
    println!(
        "  scan_refresh_interval_secs = {}",
        config.monitor.scan_refresh_interval_secs
    );
    println!(
        "  archive_history_limit      = {}",
        config.monitor.archive_history_limit
    );
    println!(
        "  scan_status_filter         = {}",
        or_unset(&config.monitor.scan_status_filter)
    );
    println!(
        "  extract_log_summaries      = {}",
        config.monitor.extract_log_summaries
    );
    println!();
    println!("[retry]");
    println!("  max_retries = {}", config.retry.max_retries);
    Ok(())
}

/// Persist the provided values into `tablewatch.toml`.
pub fn set_config(update: &ConfigUpdate) -> Result<()> {
    let path = config_path()?;
    let mut doc = if path.exists() {
        read_config_doc(&path)?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };
    apply_update(&mut doc, update);
    // Reject values that would make the file unreadable.
    config_from_doc(&doc)?;

    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    let content = toml::to_string_pretty(&doc).context("Failed to serialize config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;

    println!("Configuration updated.");
    show_config()
}
