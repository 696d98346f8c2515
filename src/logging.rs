//! Logging setup.
//!
//! The terminal is owned by the UI, so log lines go to a file. Without a log
//! file only the error layer is installed, which keeps span traces available
//! for error reports.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Level;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::VitalsError;

/// Environment variable overriding the verbosity derived level.
pub const LOG_ENV: &str = "VITALS_LOG";

pub const REDACTED_VALUE: &str = "[REDACTED]";

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Relaxed)
}

/// Cell values are patient data. They only show up in logs with `--log-data`.
pub fn redact(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub log_file: Option<PathBuf>,
    pub log_data: bool,
}

impl LogConfig {
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            log_file: None,
            log_data: false,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }
}

pub fn init_logging(config: &LogConfig) -> Result<(), VitalsError> {
    LOG_DATA_ENABLED.store(config.log_data, Ordering::Relaxed);

    let result = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(config.filter())
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true),
                )
                .with(ErrorLayer::default())
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(ErrorLayer::default())
            .try_init(),
    };
    result.map_err(|e| VitalsError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(2).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(9).level, Level::TRACE);
    }

    #[test]
    fn values_are_redacted_by_default() {
        assert_eq!(redact("98.6"), REDACTED_VALUE);
    }
}
