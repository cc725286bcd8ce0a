pub mod error;
pub mod loopback;
pub mod media;
pub mod memory;
pub mod message;
pub mod signaling;

pub use loopback::{LoopbackEngine, Switchboard};
pub use media::{
    IceGatheringState, LocalMedia, MediaBackend, MediaTrack, OfferOptions, PeerTransport,
    RemoteStream, SignalingState, TransportConfig, TransportError, TransportEvent, TransportState,
};
pub use memory::{
    BackendTask, MediaRecord, MemoryBackend, MemoryMedia, MemorySignaling, MemoryTransport,
    SentSignal, TransportRecord,
};
pub use message::{
    EventNames, IceCandidate, InboundSignal, MatchResponse, OutboundSignal, SdpKind,
    SessionDescription, SignalCodec, SignalError,
};
pub use signaling::SignalingChannel;
