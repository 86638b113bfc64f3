use std::path::Path;
use std::time::Duration;

use crate::domain::HEADER_LEN;
use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "/etc/rawsniff.conf";
const DEFAULT_STARTUP_DELAY_MS: u64 = 1000;
const DEFAULT_STOP_DEADLINE_MS: u64 = 2000;
const DEFAULT_RECV_BUFFER: usize = 65535;
const DEFAULT_LOG_FILTER: &str = "info";

/// Environment variables and the config keys they override.
const ENV_OVERRIDES: [(&str, &str); 4] = [
    ("RAWSNIFF_STARTUP_DELAY_MS", "startup_delay_ms"),
    ("RAWSNIFF_STOP_DEADLINE_MS", "stop_deadline_ms"),
    ("RAWSNIFF_RECV_BUFFER", "recv_buffer"),
    ("RAWSNIFF_LOG", "log_filter"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Pause between start and the first receive; a stop during it cancels
    /// the capture before any packet is read.
    pub startup_delay: Duration,
    /// How long stop waits for the capture loop before giving up on it.
    pub stop_deadline: Duration,
    /// Receive buffer size in bytes.
    pub recv_buffer: usize,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(DEFAULT_STARTUP_DELAY_MS),
            stop_deadline: Duration::from_millis(DEFAULT_STOP_DEADLINE_MS),
            recv_buffer: DEFAULT_RECV_BUFFER,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Defaults, then the config file, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("RAWSNIFF_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = Config::default();

        if Path::new(&config_path).exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.clone(),
                    source,
                })?;
            config.apply_file(&content)?;
        }

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `key = value` lines. Blank lines and `#` comments are skipped,
    /// unknown keys are ignored.
    pub fn apply_file(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                self.set(key.trim(), value.trim())?;
            }
        }
        Ok(())
    }

    /// Apply environment overrides fetched through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        for (name, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(name) {
                self.set(key, value.trim())?;
            }
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "startup_delay_ms" => {
                self.startup_delay = Duration::from_millis(value.parse().map_err(|_| invalid())?);
            }
            "stop_deadline_ms" => {
                self.stop_deadline = Duration::from_millis(value.parse().map_err(|_| invalid())?);
            }
            "recv_buffer" => {
                let size: usize = value.parse().map_err(|_| invalid())?;
                if !(HEADER_LEN..=DEFAULT_RECV_BUFFER).contains(&size) {
                    return Err(invalid());
                }
                self.recv_buffer = size;
            }
            "log_filter" => {
                if value.is_empty() {
                    return Err(invalid());
                }
                self.log_filter = value.to_string();
            }
            _ => {}
        }
        Ok(())
    }

    pub fn tracing_filter(&self) -> &str {
        &self.log_filter
    }
}
