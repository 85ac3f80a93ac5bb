use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RETRY_COUNT: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 1;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "PROBE_CONFIG";

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Retry and timeout settings shared by every probe issued through one
/// [`Probe`](crate::Probe).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub retry_count: u32,
    pub retry_delay_secs: u64,
    /// Per-attempt connect timeout. `0` leaves it to the OS.
    pub connect_timeout_ms: u64,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            log_level: "warn".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ProbeConfig {
    /// Defaults, overlaid with the file named by `PROBE_CONFIG` if set.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: ProbeConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_count == 0 {
            return Err(anyhow::anyhow!("retry_count must be at least 1"));
        }
        self.get_tracing_level().map(|_| ())
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!(
                "Invalid log level: {}. Valid levels are: trace, debug, info, warn, error",
                self.log_level
            )),
        }
    }

    /// Replace the retry settings. A zero retry count is raised to one.
    pub fn set_retry(&mut self, retry_count: u32, retry_delay_secs: u64) {
        if retry_count == 0 {
            tracing::warn!("retry count of 0 requested, using 1");
        }
        self.retry_count = retry_count.max(1);
        self.retry_delay_secs = retry_delay_secs;
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
