use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct UserConfig {
    pub logging: Option<LoggingCfg>,
    pub discovery: Option<DiscoveryCfg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingCfg {
    pub to_file: Option<bool>,
    pub dir: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryCfg {
    pub api_base: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,

    pub scrape_port: Option<u16>,
    pub label_policy: Option<String>, // "tags" | "flatten"
    pub flatten_prefix: Option<String>,
    pub flatten_depth: Option<usize>,
    pub sanitize_labels: Option<bool>,

    pub detail_concurrency: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

pub fn load_user_config(sd_home: &Path) -> anyhow::Result<Option<UserConfig>> {
    let path = sd_home.join("config.toml");
    if !path.exists() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)?;
    let cfg: UserConfig = toml::from_str(&s)?;
    Ok(Some(cfg))
}

/// `$SD_HOME` when set, else `$HOME/.dedibox-sd`, else `./.dedibox-sd`.
pub fn resolve_home(explicit: &str) -> PathBuf {
    if !explicit.is_empty() {
        return expand_home(explicit);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".dedibox-sd");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".dedibox-sd")
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Environment value when the variable is set, else the config file value,
/// else the flag default.
pub fn pick<T>(env_name: &str, env_value: T, cfg_value: Option<T>) -> T {
    if std::env::var_os(env_name).is_some() {
        env_value
    } else {
        cfg_value.unwrap_or(env_value)
    }
}
