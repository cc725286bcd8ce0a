use crate::domain::{MatchState, PeerId, Session, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason carried by an outgoing hang-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HangUpReason {
    UserEnded,
    ConnectionFailed,
}

impl HangUpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HangUpReason::UserEnded => "user_ended",
            HangUpReason::ConnectionFailed => "connection_failed",
        }
    }
}

impl fmt::Display for HangUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Side effect requested by a transition, executed by the engine in order
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEffect {
    /// Emit enter-pool
    EnterPool,
    /// Emit leave-pool
    LeavePool,
    /// Emit the connect response
    AcceptMatch,
    /// Emit the skip response
    SkipMatch,
    /// Emit exactly one hang-up to the session peer
    SendHangUp { to: PeerId, reason: HangUpReason },
    /// Acquire local media and start negotiating
    StartChat,
    /// Release media and transport
    Teardown,
}

/// How a session came to an end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Local user skipped the proposed match
    Skipped,
    /// Local user hung up before the chat started
    Abandoned,
    PeerSkipped {
        name: Option<String>,
    },
    PeerHungUp {
        name: Option<String>,
        reason: Option<String>,
    },
    /// Local user ended the call
    HungUp,
    ConnectionFailed,
    PeerDisconnected,
    ChannelLost,
}

impl SessionEnd {
    /// System message shown to the user, if any
    pub fn message(&self) -> Option<String> {
        match self {
            SessionEnd::Skipped | SessionEnd::Abandoned => None,
            SessionEnd::PeerSkipped { name: Some(name) } => {
                Some(format!("{} skipped the chat.", name))
            }
            SessionEnd::PeerSkipped { name: None } => {
                Some("The other user skipped the chat.".to_string())
            }
            SessionEnd::PeerHungUp {
                name: Some(name), ..
            } => Some(format!("{} ended the call.", name)),
            SessionEnd::PeerHungUp { name: None, .. } => {
                Some("The other user ended the call.".to_string())
            }
            SessionEnd::HungUp => Some("You ended the chat.".to_string()),
            SessionEnd::ConnectionFailed => {
                Some("Connection failed. The call has ended.".to_string())
            }
            SessionEnd::PeerDisconnected => Some("The other user disconnected.".to_string()),
            SessionEnd::ChannelLost => Some("Lost connection to the server.".to_string()),
        }
    }
}

/// A session removed by a transition
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub session: Session,
    pub end: SessionEnd,
}

/// Result of applying one event to the matchmaker
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: MatchState,
    pub to: MatchState,
    pub effects: Vec<MatchEffect>,
    /// Session created by this transition
    pub opened: Option<SessionId>,
    /// Session destroyed by this transition
    pub closed: Option<ClosedSession>,
}

impl Transition {
    pub fn new(from: MatchState, to: MatchState) -> Self {
        Self {
            from,
            to,
            effects: Vec::new(),
            opened: None,
            closed: None,
        }
    }

    pub fn with_effect(mut self, effect: MatchEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn has_effect(&self, effect: &MatchEffect) -> bool {
        self.effects.contains(effect)
    }

    pub fn tears_down(&self) -> bool {
        self.has_effect(&MatchEffect::Teardown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_messages() {
        assert_eq!(
            SessionEnd::PeerSkipped {
                name: Some("Alice".to_string())
            }
            .message()
            .as_deref(),
            Some("Alice skipped the chat.")
        );
        assert_eq!(
            SessionEnd::PeerHungUp {
                name: None,
                reason: Some("user_ended".to_string())
            }
            .message()
            .as_deref(),
            Some("The other user ended the call.")
        );
    }

    #[test]
    fn test_local_skip_is_silent() {
        assert_eq!(SessionEnd::Skipped.message(), None);
        assert_eq!(SessionEnd::Abandoned.message(), None);
    }

    #[test]
    fn test_hang_up_reason_wire_names() {
        assert_eq!(HangUpReason::UserEnded.as_str(), "user_ended");
        assert_eq!(
            serde_json::to_value(HangUpReason::ConnectionFailed).unwrap(),
            serde_json::json!("connection_failed")
        );
    }

    #[test]
    fn test_transition_builder() {
        let transition = Transition::new(MatchState::Chatting, MatchState::Idle)
            .with_effect(MatchEffect::Teardown);
        assert!(transition.tears_down());
        assert!(!transition.has_effect(&MatchEffect::EnterPool));
    }
}
