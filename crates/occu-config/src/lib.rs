use occu_core::{DisplayType, GranularityHint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Longest refresh window accepted from config; larger values fall back to the default
pub const MAX_POLL_WINDOW_DAYS: i64 = 3660;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL, e.g. `https://backend.example/api/v1`
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Chart preferences injected into the chart endpoints instead of being read
/// from per-user browser storage
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DashboardConfig {
    pub site_id: Option<String>,
    #[serde(default)]
    pub counters: Vec<String>,
    #[serde(default)]
    pub display_types: HashMap<String, DisplayType>,
    #[serde(default)]
    pub stacked: bool,
    pub period: Option<GranularityHint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: Option<u64>,
    /// Days of history fetched on each refresh
    pub window_days: Option<i64>,
    /// Read snapshots from this JSON file instead of the backend
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub api: Option<ApiConfig>,
    pub dashboard: Option<DashboardConfig>,
    pub server: Option<ServerConfig>,
    pub poll: Option<PollConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppConfig {
    /// Load configuration from OCCU_CONFIG path (TOML) if present, with reasonable defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("OCCU_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        if Path::new(&path).exists() {
            Self::load_from(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&s)?)
    }

    /// Get HTTP bind address (default 0.0.0.0:8080)
    pub fn http_bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
    }

    /// Refresh interval in seconds (default 300)
    pub fn poll_interval_secs(&self) -> u64 {
        self.poll
            .as_ref()
            .and_then(|p| p.interval_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or(300)
    }

    /// History fetched per refresh in days (default 1, at most [`MAX_POLL_WINDOW_DAYS`])
    pub fn poll_window_days(&self) -> i64 {
        self.poll
            .as_ref()
            .and_then(|p| p.window_days)
            .filter(|days| (1..=MAX_POLL_WINDOW_DAYS).contains(days))
            .unwrap_or(1)
    }

    pub fn source_file(&self) -> Option<String> {
        self.poll.as_ref().and_then(|p| p.source_file.clone())
    }

    /// Backend request timeout in seconds (default 30)
    pub fn api_timeout_secs(&self) -> u64 {
        self.api
            .as_ref()
            .and_then(|a| a.timeout_secs)
            .unwrap_or(30)
    }

    pub fn dashboard(&self) -> DashboardConfig {
        self.dashboard.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.http_bind(), "0.0.0.0:8080");
        assert_eq!(cfg.poll_interval_secs(), 300);
        assert_eq!(cfg.poll_window_days(), 1);
        assert_eq!(cfg.api_timeout_secs(), 30);
        assert!(cfg.source_file().is_none());
        assert!(!cfg.dashboard().stacked);
    }

    #[test]
    fn parses_dashboard_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[api]
base_url = "https://backend.example/api/v1"
timeout_secs = 10

[dashboard]
site_id = "hq"
counters = ["EntryExit", "Occupancy"]
stacked = true
period = "quarterly"

[dashboard.display_types]
EntryExit = "bar"
Occupancy = "line"

[server]
bind = "127.0.0.1:9000"

[poll]
interval_secs = 60
window_days = 7
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        let dashboard = cfg.dashboard();

        assert_eq!(cfg.http_bind(), "127.0.0.1:9000");
        assert_eq!(cfg.poll_interval_secs(), 60);
        assert_eq!(cfg.poll_window_days(), 7);
        assert_eq!(cfg.api_timeout_secs(), 10);
        assert_eq!(dashboard.site_id.as_deref(), Some("hq"));
        assert_eq!(dashboard.counters.len(), 2);
        assert!(dashboard.stacked);
        assert_eq!(dashboard.period, Some(GranularityHint::Quarterly));
        assert_eq!(dashboard.display_types.get("Occupancy"), Some(&DisplayType::Line));
    }

    #[test]
    fn zero_interval_falls_back_to_default() {
        let cfg: AppConfig = toml::from_str("[poll]\ninterval_secs = 0\n").unwrap();
        assert_eq!(cfg.poll_interval_secs(), 300);
    }

    #[test]
    fn oversized_window_falls_back_to_default() {
        let cfg: AppConfig = toml::from_str("[poll]\nwindow_days = 1000000000\n").unwrap();
        assert_eq!(cfg.poll_window_days(), 1);

        let cfg: AppConfig = toml::from_str("[poll]\nwindow_days = 3660\n").unwrap();
        assert_eq!(cfg.poll_window_days(), MAX_POLL_WINDOW_DAYS);
    }

    #[test]
    fn invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nbind = 1").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Toml(_))));
    }
}
