pub mod error;
pub mod ice_server;
pub mod media;
pub mod peer;
pub mod retry;
pub mod session;
pub mod state;

pub use error::{ConnectionError, ErrorKind, MediaFailure};
pub use ice_server::IceServer;
pub use media::{
    AudioConstraints, FacingMode, MediaConstraints, MediaKinds, TrackKind, VideoConstraints,
};
pub use peer::{initiates, PeerId, PeerInfo, RoomMember};
pub use retry::{RetryContext, RetryPolicy};
pub use session::{Session, SessionId, SessionToken, Timestamp};
pub use state::{ConnectionState, MatchState, Phase};
