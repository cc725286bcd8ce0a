//! Signaling, peer negotiation and connection supervision for pairchat
//!
//! `SessionEngine` is sans-I/O: the embedding application feeds it
//! `EngineInput`s and implements `SignalingChannel` and `MediaBackend` for
//! its platform. With the `native` feature, `EngineRuntime` drives an engine
//! on tokio.

// Application layer (use cases)
pub mod application;

// Infrastructure layer (adapters)
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    EngineInput, EngineNotice, ResourceLifecycle, SessionEngine, SessionNegotiator, UserIntent,
};
#[cfg(feature = "native")]
pub use application::runtime::{EngineHandle, EngineRuntime, EngineRuntimeBuilder};
pub use infrastructure::error::{EngineError, Result};
pub use infrastructure::{
    MediaBackend, MemoryBackend, MemorySignaling, PeerTransport, SignalCodec, SignalingChannel,
    Switchboard, LoopbackEngine,
};
pub use pairchat_core::{EngineConfig, EventProfile, MatchState, Phase};
