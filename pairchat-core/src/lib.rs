//! Domain model of the pairchat session engine.
//!
//! Pure state with no I/O: peer identities, the single live `Session`, the
//! matchmaking transition table, retry bookkeeping and configuration.

pub mod application;
pub mod config;
pub mod domain;

pub use application::{
    ClosedSession, HangUpReason, MatchEffect, MatchError, MatchEvent, Matchmaker, SessionEnd,
    Transition,
};
pub use config::{ConfigError, EngineConfig, EventProfile, RetryConfig};
pub use domain::{
    initiates, ConnectionError, ConnectionState, ErrorKind, IceServer, MatchState,
    MediaConstraints, MediaFailure, MediaKinds, Phase, PeerId, PeerInfo, RetryContext,
    RetryPolicy, RoomMember, Session, SessionId, SessionToken, Timestamp, TrackKind,
};
