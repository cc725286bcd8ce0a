use crate::domain::peer::{initiates, PeerId, PeerInfo};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of one matched pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static PROCESS_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Session creation time, in milliseconds since the first session of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        let start = PROCESS_START.get_or_init(Instant::now);
        Timestamp(start.elapsed().as_millis() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Identifies one acquisition attempt within a session.
///
/// Every asynchronous request carries the token that was current when it was
/// issued. A continuation whose token no longer matches is stale and must be
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken {
    session: SessionId,
    generation: u64,
}

impl SessionToken {
    pub fn new(session: SessionId, generation: u64) -> Self {
        Self {
            session,
            generation,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn belongs_to(&self, session: SessionId) -> bool {
        self.session == session
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.session, self.generation)
    }
}

/// A single matched pairing between the local client and one peer
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    local: PeerId,
    peer: PeerId,
    peer_info: PeerInfo,
    initiator: bool,
    created_at: Timestamp,
}

impl Session {
    pub fn new(local: PeerId, peer: PeerId, peer_info: PeerInfo) -> Self {
        let initiator = initiates(&local, &peer);
        Self {
            id: SessionId::new(),
            local,
            peer,
            peer_info,
            initiator,
            created_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn local(&self) -> &PeerId {
        &self.local
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn peer_info(&self) -> &PeerInfo {
        &self.peer_info
    }

    /// Whether this side creates the offer
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Point the session at a different peer identity.
    ///
    /// The server names the peer again when the chat starts; if that differs
    /// from the match proposal the later value wins and the initiator role is
    /// recomputed. Returns whether anything changed.
    pub fn rebind_peer(&mut self, peer: PeerId) -> bool {
        if self.peer == peer {
            return false;
        }
        self.initiator = initiates(&self.local, &peer);
        self.peer = peer;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_session_derives_initiator() {
        let session = Session::new("aaa".into(), "bbb".into(), PeerInfo::named("Bob"));
        assert!(session.is_initiator());

        let session = Session::new("bbb".into(), "aaa".into(), PeerInfo::named("Alice"));
        assert!(!session.is_initiator());
    }

    #[test]
    fn test_rebind_peer_recomputes_initiator() {
        let mut session = Session::new("m".into(), "z".into(), PeerInfo::default());
        assert!(session.is_initiator());

        assert!(session.rebind_peer("a".into()));
        assert_eq!(session.peer().as_str(), "a");
        assert!(!session.is_initiator());

        assert!(!session.rebind_peer("a".into()));
    }

    #[test]
    fn test_token_display_and_ownership() {
        let session = SessionId::new();
        let token = SessionToken::new(session, 3);

        assert!(token.belongs_to(session));
        assert!(!token.belongs_to(SessionId::new()));
        assert!(token.to_string().ends_with("#3"));
        assert_ne!(token, SessionToken::new(session, 4));
    }

    #[test]
    fn test_timestamp_is_monotonic() {
        let first = Timestamp::now();
        let second = Timestamp::now();
        assert!(second >= first);
    }
}
