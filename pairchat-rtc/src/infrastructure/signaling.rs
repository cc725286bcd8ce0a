use crate::infrastructure::error::Result;
use pairchat_core::PeerId;
use serde_json::Value;

/// Already-connected, bidirectional named-event channel to the matchmaking server
///
/// The engine only emits; inbound events are fed to it as `EngineInput::Signal`
/// by whoever owns the receiving side.
pub trait SignalingChannel {
    /// Our identity on the channel, once assigned
    fn local_id(&self) -> Option<PeerId>;

    fn emit(&mut self, event: &str, payload: Value) -> Result<()>;
}
