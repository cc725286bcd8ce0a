use crate::application::engine::SessionEngine;
use crate::application::runtime::{EngineHandle, EngineRuntime};
use crate::infrastructure::error::Result;
use crate::infrastructure::media::MediaBackend;
use crate::infrastructure::signaling::SignalingChannel;
use instant::Duration;
use pairchat_core::{EngineConfig, EventProfile, IceServer};

/// Builder for an engine together with its tokio driver
pub struct EngineRuntimeBuilder {
    config: EngineConfig,
}

impl EngineRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::voice(),
        }
    }

    /// Start from a complete configuration
    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Switch to the preset of another profile, keeping the display name
    pub fn profile(mut self, profile: EventProfile) -> Self {
        let display_name = self.config.display_name.take();
        self.config = match profile {
            EventProfile::Voice => EngineConfig::voice(),
            EventProfile::Video => EngineConfig::video(),
        };
        self.config.display_name = display_name;
        self
    }

    pub fn ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.config = self.config.with_ice_servers(servers);
        self
    }

    pub fn retry(mut self, schedule_ms: Vec<u64>, max_attempts: u32) -> Self {
        self.config = self.config.with_retry(schedule_ms, max_attempts);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_connect_timeout(timeout);
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_display_name(name);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate the configuration and wire the engine to its driver
    pub fn build<C: SignalingChannel, B: MediaBackend>(
        self,
        channel: C,
        backend: B,
    ) -> Result<(EngineRuntime<C, B>, EngineHandle<B::Media>)> {
        let engine = SessionEngine::new(self.config, channel, backend)?;
        Ok(EngineRuntime::new(engine))
    }
}

impl Default for EngineRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
