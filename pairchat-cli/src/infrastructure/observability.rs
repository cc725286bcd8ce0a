use crate::infrastructure::error::{CliError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose logs the default filter lets through
const CRATES: [&str; 3] = ["pairchat_cli", "pairchat_core", "pairchat_rtc"];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: tracing::Level,
    pub json_format: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    /// Whether to write logs to stderr at all
    pub show_logs: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            json_format: false,
            show_thread_ids: false,
            show_targets: true,
            show_logs: true,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// Only warnings and errors, for output meant to be piped
    pub fn quiet() -> Self {
        Self {
            default_level: tracing::Level::WARN,
            show_targets: false,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.default_level = level;
        self
    }

    /// One JSON object per line
    pub fn with_json(mut self) -> Self {
        self.json_format = true;
        self
    }

    pub fn without_logs(mut self) -> Self {
        self.show_logs = false;
        self
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.default_level))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn init(self) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_filter()));

        let registry = tracing_subscriber::registry().with(env_filter);

        let result = match (self.show_logs, self.json_format) {
            (false, _) => registry.try_init(),
            (true, true) => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(self.show_targets)
                        .with_thread_ids(self.show_thread_ids)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            (true, false) => registry
                .with(
                    fmt::layer()
                        .with_target(self.show_targets)
                        .with_thread_ids(self.show_thread_ids)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };

        result.map_err(|e| CliError::Logging(e.to_string()))
    }
}
