use crate::session::SessionConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Port used when neither `PORT` nor the config file provides one
pub const DEFAULT_PORT: u16 = 8189;

/// Application configuration loaded from YAML
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Directory served for the web UI
    pub static_dir: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: "./static".to_string(),
        }
    }
}

/// Session policy as written in the config file, in seconds
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    pub request_limit: u32,
    pub request_window_secs: i64,
    pub session_duration_secs: i64,
    pub extension_threshold_secs: i64,
    pub history_capacity: usize,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_limit: 10,
            request_window_secs: 60,
            session_duration_secs: 3600,
            extension_threshold_secs: 600,
            history_capacity: 5,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            request_limit: self.request_limit,
            request_window: chrono::Duration::seconds(self.request_window_secs),
            session_duration: chrono::Duration::seconds(self.session_duration_secs),
            extension_threshold: chrono::Duration::seconds(self.extension_threshold_secs),
            history_capacity: self.history_capacity,
            sweep_interval: std::time::Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

/// Upper bound on any configured duration (ten years)
const MAX_DURATION_SECS: i64 = 10 * 365 * 24 * 3600;

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        let s = &self.session;

        if s.request_limit == 0 {
            return Err("session.request_limit must be at least 1".to_string());
        }
        if s.history_capacity == 0 {
            return Err("session.history_capacity must be at least 1".to_string());
        }
        if s.sweep_interval_secs == 0 {
            return Err("session.sweep_interval_secs must be at least 1".to_string());
        }

        for (name, value) in [
            ("request_window_secs", s.request_window_secs),
            ("session_duration_secs", s.session_duration_secs),
            ("extension_threshold_secs", s.extension_threshold_secs),
        ] {
            if value <= 0 || value > MAX_DURATION_SECS {
                return Err(format!(
                    "session.{} must be between 1 and {}",
                    name, MAX_DURATION_SECS
                ));
            }
        }

        if s.extension_threshold_secs >= s.session_duration_secs {
            return Err(
                "session.extension_threshold_secs must be shorter than session_duration_secs"
                    .to_string(),
            );
        }

        Ok(())
    }
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, String> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config: AppConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse YAML config: {}", e))?;

    config.validate()?;

    info!(
        "Configuration loaded: limit {} per {}s, session {}s, sweep every {}s",
        config.session.request_limit,
        config.session.request_window_secs,
        config.session.session_duration_secs,
        config.session.sweep_interval_secs
    );

    Ok(config)
}

/// Load configuration with fallback options.
///
/// Tries `CONFIG_PATH`, then the usual file names in the working directory,
/// then the built-in defaults.
pub fn load_config_with_fallback() -> AppConfig {
    if let Ok(config_path) = std::env::var("CONFIG_PATH") {
        match load_config(&config_path) {
            Ok(config) => return config,
            Err(e) => warn!(
                "Failed to load config from CONFIG_PATH ({}): {}",
                config_path, e
            ),
        }
    }

    for path in ["config.yaml", "config.yml"] {
        if Path::new(path).exists() {
            match load_config(path) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to load config from '{}': {}", path, e),
            }
        }
    }

    info!("No configuration file found, using defaults");
    AppConfig::default()
}

/// Resolve the listening port: a valid `PORT` wins over the configured one
pub fn resolve_port(env_value: Option<&str>, configured: u16) -> u16 {
    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                warn!("Ignoring invalid PORT value '{}'", raw);
                configured
            }
        },
        None => configured,
    }
}

pub fn port_from_env(configured: u16) -> u16 {
    resolve_port(std::env::var("PORT").ok().as_deref(), configured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_config() {
        let yaml = r#"
server:
  port: 9000
session:
  request_limit: 3
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.static_dir, "./static");
        assert_eq!(config.session.request_limit, 3);
        assert_eq!(config.session.session_duration_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_defaults_match_session_config() {
        let session = SessionSettings::default().to_session_config();
        let expected = SessionConfig::default();

        assert_eq!(session.request_limit, expected.request_limit);
        assert_eq!(session.request_window, expected.request_window);
        assert_eq!(session.session_duration, expected.session_duration);
        assert_eq!(session.extension_threshold, expected.extension_threshold);
        assert_eq!(session.history_capacity, expected.history_capacity);
        assert_eq!(session.sweep_interval, expected.sweep_interval);
    }

    #[test]
    fn test_config_validation_zero_limit() {
        let mut config = AppConfig::default();
        config.session.request_limit = 0;

        let result = config.validate();
        assert!(result.unwrap_err().contains("request_limit"));
    }

    #[test]
    fn test_config_validation_threshold_longer_than_session() {
        let mut config = AppConfig::default();
        config.session.extension_threshold_secs = 7200;

        let result = config.validate();
        assert!(result.unwrap_err().contains("extension_threshold_secs"));
    }

    #[test]
    fn test_config_validation_negative_window() {
        let mut config = AppConfig::default();
        config.session.request_window_secs = -5;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session:\n  history_capacity: 8\n  sweep_interval_secs: 5").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.session.history_capacity, 8);
        assert_eq!(config.session.sweep_interval_secs, 5);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session:\n  request_limit: 0").unwrap();

        assert!(load_config(file.path()).is_err());
        assert!(load_config("/nonexistent/config.yaml").is_err());
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(None, DEFAULT_PORT), 8189);
        assert_eq!(resolve_port(Some("3000"), DEFAULT_PORT), 3000);
        assert_eq!(resolve_port(Some(" 3001 "), DEFAULT_PORT), 3001);
        assert_eq!(resolve_port(Some("not-a-port"), DEFAULT_PORT), 8189);
        assert_eq!(resolve_port(Some("70000"), 9000), 9000);
        assert_eq!(resolve_port(Some(""), 9000), 9000);
    }
}
