use crate::application::effects::{
    ClosedSession, HangUpReason, MatchEffect, SessionEnd, Transition,
};
use crate::application::events::MatchEvent;
use crate::domain::{MatchState, PeerId, Session};

/// Errors produced by the matchmaking transition table
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("Event {event} is not valid in state {state}")]
    InvalidTransition {
        state: MatchState,
        event: &'static str,
    },

    #[error("Local identity is not known yet")]
    NoLocalIdentity,

    #[error("Peer {0} does not belong to the current session")]
    UnknownPeer(PeerId),
}

pub type Result<T> = std::result::Result<T, MatchError>;

/// Owns the match lifecycle and the single live `Session`
///
/// `apply` either performs a transition and returns the effects the caller
/// must execute, or returns an error and leaves everything untouched.
#[derive(Debug, Clone, Default)]
pub struct Matchmaker {
    state: MatchState,
    session: Option<Session>,
    local_id: Option<PeerId>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_id(local_id: PeerId) -> Self {
        Self {
            local_id: Some(local_id),
            ..Self::default()
        }
    }

    /// Set (or replace) our identity on the signaling channel
    pub fn set_local_id(&mut self, local_id: PeerId) {
        self.local_id = Some(local_id);
    }

    pub fn local_id(&self) -> Option<&PeerId> {
        self.local_id.as_ref()
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_chatting(&self) -> bool {
        self.state == MatchState::Chatting
    }

    /// Apply one event to the transition table
    pub fn apply(&mut self, event: MatchEvent) -> Result<Transition> {
        let from = self.state;
        let name = event.name();

        let transition = match (from, event) {
            (MatchState::Idle, MatchEvent::StartSearch) => {
                Transition::new(from, MatchState::Searching).with_effect(MatchEffect::EnterPool)
            }

            (MatchState::Searching, MatchEvent::StopSearch) => {
                Transition::new(from, MatchState::Idle).with_effect(MatchEffect::LeavePool)
            }

            (MatchState::Searching, MatchEvent::MatchFound { peer, info }) => {
                let local = self.local_id.clone().ok_or(MatchError::NoLocalIdentity)?;
                if peer.is_empty() {
                    return Err(MatchError::UnknownPeer(peer));
                }
                if peer == local {
                    tracing::warn!("⚠️ Matched with our own identity {}, nobody will initiate", peer);
                }

                let session = Session::new(local, peer, info);
                let mut transition = Transition::new(from, MatchState::Matched);
                transition.opened = Some(session.id());
                self.session = Some(session);
                transition
            }

            (MatchState::Matched, MatchEvent::WaitingForPeer) => {
                Transition::new(from, MatchState::Waiting)
            }

            (MatchState::Matched, MatchEvent::Accept) => {
                Transition::new(from, MatchState::Waiting).with_effect(MatchEffect::AcceptMatch)
            }

            (MatchState::Matched, MatchEvent::Skip) => {
                let mut transition = Transition::new(from, MatchState::Searching)
                    .with_effect(MatchEffect::SkipMatch);
                transition.closed = self.close(SessionEnd::Skipped);
                transition
            }

            (MatchState::Matched | MatchState::Waiting, MatchEvent::BothAccepted { peer }) => {
                if let (Some(peer), Some(session)) = (peer, self.session.as_mut()) {
                    let previous = session.peer().clone();
                    if session.rebind_peer(peer) {
                        tracing::warn!(
                            "⚠️ Chat started with {} but match named {}, following the server",
                            session.peer(),
                            previous
                        );
                    }
                }
                Transition::new(from, MatchState::Chatting).with_effect(MatchEffect::StartChat)
            }

            (MatchState::Matched | MatchState::Waiting, MatchEvent::PeerSkipped { name }) => {
                let mut transition = Transition::new(from, MatchState::Searching)
                    .with_effect(MatchEffect::EnterPool);
                transition.closed = self.close(SessionEnd::PeerSkipped { name });
                transition
            }

            (MatchState::Chatting, MatchEvent::PeerSkipped { name }) => {
                let mut transition = Transition::new(from, MatchState::Searching)
                    .with_effect(MatchEffect::Teardown)
                    .with_effect(MatchEffect::EnterPool);
                transition.closed = self.close(SessionEnd::PeerSkipped { name });
                transition
            }

            (
                MatchState::Matched | MatchState::Waiting | MatchState::Chatting,
                MatchEvent::PeerHungUp { name, reason },
            ) => {
                let mut transition = Transition::new(from, MatchState::Idle);
                if from == MatchState::Chatting {
                    transition = transition.with_effect(MatchEffect::Teardown);
                }
                transition.closed = self.close(SessionEnd::PeerHungUp { name, reason });
                transition
            }

            (MatchState::Chatting, MatchEvent::HangUp) => {
                self.end_chat(HangUpReason::UserEnded, SessionEnd::HungUp)
            }

            (MatchState::Chatting, MatchEvent::RetryExhausted) => {
                self.end_chat(HangUpReason::ConnectionFailed, SessionEnd::ConnectionFailed)
            }

            (MatchState::Matched | MatchState::Waiting, MatchEvent::HangUp) => {
                let mut transition = Transition::new(from, MatchState::Idle)
                    .with_effect(MatchEffect::SkipMatch)
                    .with_effect(MatchEffect::LeavePool);
                transition.closed = self.close(SessionEnd::Abandoned);
                transition
            }

            (
                MatchState::Matched | MatchState::Waiting | MatchState::Chatting,
                MatchEvent::PeerDisconnected { peer },
            ) => {
                let ours = self
                    .session
                    .as_ref()
                    .map(|session| session.peer() == &peer)
                    .unwrap_or(false);
                if !ours {
                    return Err(MatchError::UnknownPeer(peer));
                }

                let mut transition = Transition::new(from, MatchState::Idle);
                if from == MatchState::Chatting {
                    transition = transition.with_effect(MatchEffect::Teardown);
                }
                transition.closed = self.close(SessionEnd::PeerDisconnected);
                transition
            }

            (_, MatchEvent::ChannelLost) => {
                let mut transition =
                    Transition::new(from, MatchState::Idle).with_effect(MatchEffect::Teardown);
                transition.closed = self.close(SessionEnd::ChannelLost);
                transition
            }

            (state, _) => {
                return Err(MatchError::InvalidTransition { state, event: name });
            }
        };

        self.state = transition.to;
        if transition.from != transition.to {
            tracing::info!("🔀 {} --{}--> {}", transition.from, name, transition.to);
        }
        debug_assert_eq!(self.state.has_session(), self.session.is_some());

        Ok(transition)
    }

    fn end_chat(&mut self, reason: HangUpReason, end: SessionEnd) -> Transition {
        let mut transition = Transition::new(MatchState::Chatting, MatchState::Idle);
        if let Some(session) = &self.session {
            transition = transition.with_effect(MatchEffect::SendHangUp {
                to: session.peer().clone(),
                reason,
            });
        }
        transition = transition.with_effect(MatchEffect::Teardown);
        transition.closed = self.close(end);
        transition
    }

    fn close(&mut self, end: SessionEnd) -> Option<ClosedSession> {
        self.session
            .take()
            .map(|session| ClosedSession { session, end })
    }
}
