use crate::domain::{IceServer, MediaConstraints, RetryPolicy};
use instant::Duration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which set of signaling event names the engine speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventProfile {
    /// Unprefixed events (`start-search`, `match-found`, ...)
    #[default]
    Voice,
    /// `video-` prefixed events (`start-video-search`, `video-match-found`, ...)
    Video,
}

impl fmt::Display for EventProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventProfile::Voice => write!(f, "voice"),
            EventProfile::Video => write!(f, "video"),
        }
    }
}

/// Automatic retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before each automatic retry; the last value repeats
    pub schedule_ms: Vec<u64>,
    /// Automatic retries per session before the failure becomes terminal
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            schedule_ms: RetryPolicy::DEFAULT_SCHEDULE_MS.to_vec(),
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Errors found while loading or validating an `EngineConfig`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Retry schedule must contain at least one delay")]
    EmptyRetrySchedule,

    #[error("Connect timeout must be greater than zero")]
    ZeroConnectTimeout,

    #[error("TURN server {url} requires a username and credential")]
    MissingTurnCredentials { url: String },

    #[error("At least one of audio or video must be enabled")]
    NoMediaKinds,

    #[error("ICE server entry without any URL")]
    NoIceUrls,
}

/// Everything that differs between deployments of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub profile: EventProfile,
    pub media: MediaConstraints,
    pub ice_servers: Vec<IceServer>,
    pub ice_candidate_pool_size: u8,
    pub retry: RetryConfig,
    /// Time allowed for each attempt to reach `connected`
    pub connect_timeout_ms: u64,
    /// Remote candidates kept while the transport is not ready
    pub ice_buffer_limit: usize,
    /// Our name, sent along with hang-ups and room joins
    pub display_name: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::voice()
    }
}

impl EngineConfig {
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_ICE_CANDIDATE_POOL_SIZE: u8 = 10;
    pub const DEFAULT_ICE_BUFFER_LIMIT: usize = 64;

    /// Microphone only, unprefixed events
    pub fn voice() -> Self {
        Self {
            profile: EventProfile::Voice,
            media: MediaConstraints::voice(),
            ice_servers: IceServer::voice_defaults(),
            ice_candidate_pool_size: Self::DEFAULT_ICE_CANDIDATE_POOL_SIZE,
            retry: RetryConfig::default(),
            connect_timeout_ms: Self::DEFAULT_CONNECT_TIMEOUT_MS,
            ice_buffer_limit: Self::DEFAULT_ICE_BUFFER_LIMIT,
            display_name: None,
        }
    }

    /// Camera and microphone, `video-` prefixed events
    pub fn video() -> Self {
        Self {
            profile: EventProfile::Video,
            media: MediaConstraints::video(),
            ice_servers: IceServer::video_defaults(),
            ..Self::voice()
        }
    }

    /// Parse and validate a JSON document; missing fields keep the voice defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.schedule_ms.is_empty() {
            return Err(ConfigError::EmptyRetrySchedule);
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        if self.media.kinds().is_empty() {
            return Err(ConfigError::NoMediaKinds);
        }
        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(ConfigError::NoIceUrls);
            }
            if server.is_turn() && !server.has_credentials() {
                return Err(ConfigError::MissingTurnCredentials {
                    url: server.urls.join(","),
                });
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(&self.retry.schedule_ms, self.retry.max_attempts)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_turn_server(
        mut self,
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.ice_servers
            .push(IceServer::turn(url, username, credential));
        self
    }

    pub fn with_retry(mut self, schedule_ms: Vec<u64>, max_attempts: u32) -> Self {
        self.retry = RetryConfig {
            schedule_ms,
            max_attempts,
        };
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_ice_buffer_limit(mut self, limit: usize) -> Self {
        self.ice_buffer_limit = limit;
        self
    }
}
