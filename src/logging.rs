// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Logging and observability setup.
//!
//! The crate emits structured `tracing` events at the interesting seams:
//! tensor moves during transfer, native-side release anomalies, and download
//! progress. This module owns subscriber initialization so applications and
//! tests configure output in one place; the `RUST_LOG` environment variable
//! always takes precedence over the configured default level.

use std::sync::Once;

/// Configuration for logging initialization.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level when `RUST_LOG` is not set.
    pub default_level: LogLevel,
    /// Include timestamps in log output.
    pub with_timestamps: bool,
    /// Include target (module path) in log output.
    pub with_target: bool,
    /// Use ANSI colors (disable for file output).
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            with_timestamps: true,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Create a new logging configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default log level.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Enable or disable timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    /// Preset for development: verbose, colored.
    #[must_use]
    pub fn development() -> Self {
        Self {
            default_level: LogLevel::Debug,
            with_timestamps: true,
            with_target: true,
            with_ansi: true,
        }
    }

    /// Preset for testing: quiet, plain, captured by the harness.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            default_level: LogLevel::Warn,
            with_timestamps: false,
            with_target: false,
            with_ansi: false,
        }
    }
}

/// Log level enumeration, mapping to tracing levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and above.
    Warn,
    /// Informational messages and above.
    #[default]
    Info,
    /// Debug messages and above.
    Debug,
    /// All messages including trace.
    Trace,
}

impl LogLevel {
    fn as_filter_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

static INIT_LOGGING: Once = Once::new();

/// Initialize the global tracing subscriber.
///
/// Call once at application startup; further calls are no-ops, so tests can
/// invoke it freely. `RUST_LOG` overrides `config.default_level`.
pub fn init_logging(config: &LogConfig) {
    INIT_LOGGING.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| config.default_level.as_filter_str().to_string());

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.with_ansi)
            .with_target(config.with_target);

        if config.with_timestamps {
            builder.init();
        } else {
            builder.without_time().init();
        }
    });
}

/// Emit a download-progress event.
///
/// The hub reports progress through structured logging rather than a
/// terminal bar; consumers that want a bar can subscribe to the
/// `nn_interop::hub` target.
pub fn log_download_progress(url: &str, downloaded: u64, total: Option<u64>) {
    match total {
        Some(total) if total > 0 => {
            #[allow(clippy::cast_precision_loss)]
            let pct = (downloaded as f64 / total as f64) * 100.0;
            tracing::debug!(
                target: "nn_interop::hub",
                url,
                downloaded,
                total,
                progress_pct = pct,
                "download progress"
            );
        }
        _ => {
            tracing::debug!(
                target: "nn_interop::hub",
                url,
                downloaded,
                "download progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(matches!(config.default_level, LogLevel::Info));
        assert!(config.with_timestamps);
        assert!(config.with_ansi);
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new()
            .with_level(LogLevel::Debug)
            .with_timestamps(false)
            .with_ansi(false);

        assert!(matches!(config.default_level, LogLevel::Debug));
        assert!(!config.with_timestamps);
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_log_config_presets() {
        let dev = LogConfig::development();
        assert!(matches!(dev.default_level, LogLevel::Debug));

        let test = LogConfig::testing();
        assert!(matches!(test.default_level, LogLevel::Warn));
        assert!(!test.with_timestamps);
    }

    #[test]
    fn test_log_level_filter_str() {
        assert_eq!(LogLevel::Error.as_filter_str(), "error");
        assert_eq!(LogLevel::Trace.as_filter_str(), "trace");
    }

    #[test]
    fn test_progress_logging_does_not_panic() {
        log_download_progress("http://example.com/w.bin", 512, Some(1024));
        log_download_progress("http://example.com/w.bin", 512, None);
        log_download_progress("http://example.com/w.bin", 0, Some(0));
    }
}
