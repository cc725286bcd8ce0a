use pairchat_core::ConfigError;

/// Engine infrastructure errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine runtime stopped")]
    RuntimeStopped,

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Client already connected: {0}")]
    DuplicateClient(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
