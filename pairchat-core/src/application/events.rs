use crate::domain::{PeerId, PeerInfo};

/// Everything that can move the matchmaking lifecycle
///
/// User intent and server notifications share one enum so the transition
/// table can be matched exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    /// User wants to be paired with someone
    StartSearch,

    /// User leaves the pool before a match
    StopSearch,

    /// Server paired us with `peer`
    MatchFound { peer: PeerId, info: PeerInfo },

    /// Server acknowledged our accept and waits for the peer
    WaitingForPeer,

    /// User accepts the proposed match
    Accept,

    /// User declines the proposed match
    Skip,

    /// Both sides accepted; `peer` is the identity the server names for the chat
    BothAccepted { peer: Option<PeerId> },

    /// The peer declined or skipped away
    PeerSkipped { name: Option<String> },

    /// The peer ended the call
    PeerHungUp {
        name: Option<String>,
        reason: Option<String>,
    },

    /// User ends the call (or abandons the match)
    HangUp,

    /// Retries are exhausted and the user gave up on the call
    RetryExhausted,

    /// Server reports that a client went away
    PeerDisconnected { peer: PeerId },

    /// Our own signaling connection dropped
    ChannelLost,
}

impl MatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MatchEvent::StartSearch => "StartSearch",
            MatchEvent::StopSearch => "StopSearch",
            MatchEvent::MatchFound { .. } => "MatchFound",
            MatchEvent::WaitingForPeer => "WaitingForPeer",
            MatchEvent::Accept => "Accept",
            MatchEvent::Skip => "Skip",
            MatchEvent::BothAccepted { .. } => "BothAccepted",
            MatchEvent::PeerSkipped { .. } => "PeerSkipped",
            MatchEvent::PeerHungUp { .. } => "PeerHungUp",
            MatchEvent::HangUp => "HangUp",
            MatchEvent::RetryExhausted => "RetryExhausted",
            MatchEvent::PeerDisconnected { .. } => "PeerDisconnected",
            MatchEvent::ChannelLost => "ChannelLost",
        }
    }
}
