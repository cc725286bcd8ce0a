use pairchat_core::ConfigError;
use pairchat_rtc::EngineError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Config file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Scenario '{scenario}' ended in {phase}, expected {expected}")]
    ScenarioMismatch {
        scenario: String,
        phase: String,
        expected: String,
    },
}

impl CliError {
    pub fn config_not_found(path: PathBuf) -> Self {
        CliError::ConfigFileNotFound { path }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
