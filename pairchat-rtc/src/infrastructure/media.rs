use crate::infrastructure::message::{IceCandidate, SdpKind, SessionDescription};
use pairchat_core::{IceServer, MediaConstraints, MediaKinds, SessionToken, TrackKind};
use std::fmt;

/// Failures reported by a peer transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Operation not allowed in the current signaling state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Transport closed")]
    Closed,
}

/// Offer / answer state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// Connectivity reported by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// States that count as losing the connection
    pub fn is_down(&self) -> bool {
        matches!(
            self,
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed
        )
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::New => "new",
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Disconnected => "disconnected",
            TransportState::Failed => "failed",
            TransportState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

/// Which media the local description asks the peer for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OfferOptions {
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl From<MediaKinds> for OfferOptions {
    fn from(kinds: MediaKinds) -> Self {
        Self {
            receive_audio: kinds.audio,
            receive_video: kinds.video,
        }
    }
}

/// Settings handed to `MediaBackend::create_transport`
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServer>,
    pub ice_candidate_pool_size: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub enabled: bool,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: true,
        }
    }
}

/// Media arriving from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

/// Callbacks a transport delivers, tagged by the caller with the token it was created for
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    StateChanged(TransportState),
    GatheringChanged(IceGatheringState),
    LocalCandidate(IceCandidate),
    RemoteStream(RemoteStream),
}

/// A captured local media source
pub trait LocalMedia {
    fn tracks(&self) -> Vec<MediaTrack>;

    /// Enable or disable every track of `kind`; returns false if there is none
    fn set_enabled(&mut self, kind: TrackKind, enabled: bool) -> bool;

    /// Stop every track; calling it twice is harmless
    fn stop(&mut self);
}

/// One peer-to-peer media transport
///
/// `create_local_description` completes asynchronously: the result is fed
/// back as `EngineInput::DescriptionCreated` carrying the token the transport
/// was created with. Everything else completes synchronously.
pub trait PeerTransport {
    fn add_track(&mut self, track: &MediaTrack) -> Result<(), TransportError>;

    fn create_local_description(&mut self, kind: SdpKind, options: &OfferOptions);

    fn set_local_description(
        &mut self,
        description: &SessionDescription,
    ) -> Result<(), TransportError>;

    fn set_remote_description(
        &mut self,
        description: &SessionDescription,
    ) -> Result<(), TransportError>;

    fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> Result<(), TransportError>;

    fn signaling_state(&self) -> SignalingState;

    /// Stop delivering callbacks
    fn detach(&mut self);

    fn close(&mut self);
}

/// Device capture and transport factory
pub trait MediaBackend {
    type Media: LocalMedia;
    type Transport: PeerTransport;

    /// Start acquiring local media; the outcome arrives as `EngineInput::MediaResolved`
    fn request_local_media(&mut self, token: SessionToken, constraints: &MediaConstraints);

    fn create_transport(
        &mut self,
        token: SessionToken,
        config: &TransportConfig,
    ) -> Result<Self::Transport, TransportError>;

    fn attach_remote_stream(&mut self, stream: &RemoteStream);

    fn clear_remote_stream(&mut self);
}
