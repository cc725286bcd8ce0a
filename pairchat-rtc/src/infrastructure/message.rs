use pairchat_core::{EventProfile, HangUpReason, PeerId, PeerInfo, RoomMember};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Session description type as used on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpKind::Offer => write!(f, "offer"),
            SdpKind::Answer => write!(f, "answer"),
            SdpKind::Pranswer => write!(f, "pranswer"),
            SdpKind::Rollback => write!(f, "rollback"),
        }
    }
}

/// `{type, sdp}` as carried by offer / answer events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(kind: SdpKind, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }
}

/// A trickled ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, index: Option<u16>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid,
            sdp_m_line_index: index,
        }
    }

    /// Empty candidate string marks the end of gathering
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.trim().is_empty()
    }
}

/// Answer to a match proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResponse {
    Connect,
    Skip,
}

/// Event names for one signaling profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventNames {
    pub enter_pool: &'static str,
    pub leave_pool: &'static str,
    pub user_response: &'static str,
    pub chat_ended: &'static str,
    pub join_room: &'static str,
    pub leave_room: &'static str,
    pub match_found: &'static str,
    pub chat_start: &'static str,
    pub chat_skip: &'static str,
    pub waiting_peer: &'static str,
    pub peer_disconnected: &'static str,
    pub room_users: &'static str,
    pub offer: &'static str,
    pub answer: &'static str,
    pub ice_candidate: &'static str,
    /// Responder asks the initiator for a fresh offer
    pub restart_call: &'static str,
}

impl EventNames {
    pub const VOICE: Self = Self {
        enter_pool: "start-search",
        leave_pool: "stop-search",
        user_response: "user-response",
        chat_ended: "chat-ended",
        join_room: "join-voice-chat",
        leave_room: "leave-voice-chat",
        match_found: "match-found",
        chat_start: "chat-start",
        chat_skip: "chat-skip",
        waiting_peer: "waiting-peer-response",
        peer_disconnected: "peer-disconnected",
        room_users: "voice-chat-users",
        offer: "offer",
        answer: "answer",
        ice_candidate: "ice-candidate",
        restart_call: "restart-call",
    };

    pub const VIDEO: Self = Self {
        enter_pool: "start-video-search",
        leave_pool: "stop-video-search",
        user_response: "video-user-response",
        chat_ended: "video-chat-ended",
        join_room: "join-video-chat",
        leave_room: "leave-video-chat",
        match_found: "video-match-found",
        chat_start: "video-chat-start",
        chat_skip: "video-chat-skip",
        waiting_peer: "video-waiting-peer-response",
        peer_disconnected: "video-peer-disconnected",
        room_users: "video-chat-users",
        offer: "offer",
        answer: "answer",
        ice_candidate: "ice-candidate",
        restart_call: "video-restart-call",
    };

    pub fn for_profile(profile: EventProfile) -> Self {
        match profile {
            EventProfile::Voice => Self::VOICE,
            EventProfile::Video => Self::VIDEO,
        }
    }
}

/// Signals the engine sends to the server
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundSignal {
    EnterPool,
    LeavePool,
    Respond(MatchResponse),
    HangUp {
        to: PeerId,
        name: Option<String>,
        reason: HangUpReason,
    },
    JoinRoom(RoomMember),
    LeaveRoom,
    Offer {
        to: PeerId,
        offer: SessionDescription,
    },
    Answer {
        to: PeerId,
        answer: SessionDescription,
    },
    IceCandidate {
        to: PeerId,
        candidate: IceCandidate,
    },
    RestartCall {
        to: PeerId,
    },
}

impl OutboundSignal {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundSignal::EnterPool => "EnterPool",
            OutboundSignal::LeavePool => "LeavePool",
            OutboundSignal::Respond(_) => "Respond",
            OutboundSignal::HangUp { .. } => "HangUp",
            OutboundSignal::JoinRoom(_) => "JoinRoom",
            OutboundSignal::LeaveRoom => "LeaveRoom",
            OutboundSignal::Offer { .. } => "Offer",
            OutboundSignal::Answer { .. } => "Answer",
            OutboundSignal::IceCandidate { .. } => "IceCandidate",
            OutboundSignal::RestartCall { .. } => "RestartCall",
        }
    }
}

/// Signals the server delivers to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum InboundSignal {
    MatchFound {
        peer_id: PeerId,
        peer_info: PeerInfo,
    },
    ChatStart {
        peer_id: Option<PeerId>,
    },
    ChatSkip {
        by: Option<PeerId>,
        name: Option<String>,
    },
    ChatEnded {
        by: Option<PeerId>,
        name: Option<String>,
        reason: Option<String>,
    },
    WaitingForPeer,
    PeerDisconnected {
        peer_id: PeerId,
    },
    RoomUsers(Vec<RoomMember>),
    Offer {
        offer: SessionDescription,
        from: PeerId,
    },
    Answer {
        answer: SessionDescription,
        from: PeerId,
    },
    IceCandidate {
        candidate: IceCandidate,
        from: PeerId,
    },
    RestartCall {
        from: PeerId,
    },
}

/// Errors while mapping between signals and named events
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Malformed {event} payload: {source}")]
    Malformed {
        event: String,
        source: serde_json::Error,
    },

    #[error("Failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchFoundPayload {
    peer_id: PeerId,
    #[serde(default)]
    peer_info: PeerInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatStartPayload {
    #[serde(default)]
    peer_id: Option<PeerId>,
}

#[derive(Debug, Default, Deserialize)]
struct EndedByPayload {
    #[serde(default)]
    by: Option<PeerId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerDisconnectedPayload {
    peer_id: PeerId,
}

#[derive(Debug, Deserialize)]
struct OfferPayload {
    offer: SessionDescription,
    #[serde(alias = "to")]
    from: PeerId,
}

#[derive(Debug, Deserialize)]
struct AnswerPayload {
    answer: SessionDescription,
    #[serde(alias = "to")]
    from: PeerId,
}

#[derive(Debug, Deserialize)]
struct CandidatePayload {
    candidate: IceCandidate,
    #[serde(alias = "to")]
    from: PeerId,
}

#[derive(Debug, Deserialize)]
struct RestartPayload {
    #[serde(alias = "to")]
    from: PeerId,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    response: MatchResponse,
}

#[derive(Debug, Deserialize)]
struct HangUpPayload {
    to: PeerId,
    #[serde(default)]
    name: Option<String>,
    reason: HangUpReason,
}

#[derive(Debug, Clone, Copy)]
enum InboundKind {
    MatchFound,
    ChatStart,
    ChatSkip,
    ChatEnded,
    WaitingForPeer,
    PeerDisconnected,
    RoomUsers,
    Offer,
    Answer,
    IceCandidate,
    RestartCall,
}

#[derive(Debug, Clone, Copy)]
enum OutboundKind {
    EnterPool,
    LeavePool,
    Respond,
    HangUp,
    JoinRoom,
    LeaveRoom,
    Offer,
    Answer,
    IceCandidate,
    RestartCall,
}

/// Maps signals to `(event, payload)` pairs for one profile and back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalCodec {
    names: EventNames,
}

impl SignalCodec {
    pub fn new(profile: EventProfile) -> Self {
        Self {
            names: EventNames::for_profile(profile),
        }
    }

    pub fn names(&self) -> &EventNames {
        &self.names
    }

    /// Encode a client → server signal
    pub fn encode(
        &self,
        signal: &OutboundSignal,
    ) -> Result<(&'static str, Value), SignalError> {
        let n = &self.names;
        let encoded = match signal {
            OutboundSignal::EnterPool => (n.enter_pool, Value::Null),
            OutboundSignal::LeavePool => (n.leave_pool, Value::Null),
            OutboundSignal::Respond(response) => {
                (n.user_response, json!({ "response": response }))
            }
            OutboundSignal::HangUp { to, name, reason } => {
                let mut payload = json!({ "to": to, "reason": reason });
                if let Some(name) = name {
                    payload["name"] = Value::String(name.clone());
                }
                (n.chat_ended, payload)
            }
            OutboundSignal::JoinRoom(member) => (
                n.join_room,
                serde_json::to_value(member).map_err(|source| SignalError::Encode {
                    event: n.join_room,
                    source,
                })?,
            ),
            OutboundSignal::LeaveRoom => (n.leave_room, Value::Null),
            OutboundSignal::Offer { to, offer } => {
                (n.offer, json!({ "offer": offer, "to": to }))
            }
            OutboundSignal::Answer { to, answer } => {
                (n.answer, json!({ "answer": answer, "to": to }))
            }
            OutboundSignal::IceCandidate { to, candidate } => {
                (n.ice_candidate, json!({ "candidate": candidate, "to": to }))
            }
            OutboundSignal::RestartCall { to } => (n.restart_call, json!({ "to": to })),
        };
        Ok(encoded)
    }

    /// Decode a server → client event
    pub fn decode(&self, event: &str, payload: Value) -> Result<InboundSignal, SignalError> {
        let kind = self
            .inbound_kind(event)
            .ok_or_else(|| SignalError::UnknownEvent(event.to_string()))?;
        let malformed = |source| SignalError::Malformed {
            event: event.to_string(),
            source,
        };

        let signal = match kind {
            InboundKind::MatchFound => {
                let p: MatchFoundPayload = parse(payload).map_err(malformed)?;
                InboundSignal::MatchFound {
                    peer_id: p.peer_id,
                    peer_info: p.peer_info,
                }
            }
            InboundKind::ChatStart => {
                let p: ChatStartPayload = parse_optional(payload).map_err(malformed)?;
                InboundSignal::ChatStart { peer_id: p.peer_id }
            }
            InboundKind::ChatSkip => {
                let p: EndedByPayload = parse_optional(payload).map_err(malformed)?;
                InboundSignal::ChatSkip {
                    by: p.by,
                    name: p.name,
                }
            }
            InboundKind::ChatEnded => {
                let p: EndedByPayload = parse_optional(payload).map_err(malformed)?;
                InboundSignal::ChatEnded {
                    by: p.by,
                    name: p.name,
                    reason: p.reason,
                }
            }
            InboundKind::WaitingForPeer => InboundSignal::WaitingForPeer,
            InboundKind::PeerDisconnected => {
                let p: PeerDisconnectedPayload = parse(payload).map_err(malformed)?;
                InboundSignal::PeerDisconnected { peer_id: p.peer_id }
            }
            InboundKind::RoomUsers => {
                InboundSignal::RoomUsers(parse(payload).map_err(malformed)?)
            }
            InboundKind::Offer => {
                let p: OfferPayload = parse(payload).map_err(malformed)?;
                InboundSignal::Offer {
                    offer: p.offer,
                    from: p.from,
                }
            }
            InboundKind::Answer => {
                let p: AnswerPayload = parse(payload).map_err(malformed)?;
                InboundSignal::Answer {
                    answer: p.answer,
                    from: p.from,
                }
            }
            InboundKind::IceCandidate => {
                let p: CandidatePayload = parse(payload).map_err(malformed)?;
                InboundSignal::IceCandidate {
                    candidate: p.candidate,
                    from: p.from,
                }
            }
            InboundKind::RestartCall => {
                let p: RestartPayload = parse(payload).map_err(malformed)?;
                InboundSignal::RestartCall { from: p.from }
            }
        };
        Ok(signal)
    }

    /// Encode a server → client event (used by the loopback server)
    pub fn encode_inbound(
        &self,
        signal: &InboundSignal,
    ) -> Result<(&'static str, Value), SignalError> {
        let n = &self.names;
        let encoded = match signal {
            InboundSignal::MatchFound { peer_id, peer_info } => (
                n.match_found,
                json!({ "peerId": peer_id, "peerInfo": peer_info }),
            ),
            InboundSignal::ChatStart { peer_id } => (n.chat_start, json!({ "peerId": peer_id })),
            InboundSignal::ChatSkip { by, name } => {
                (n.chat_skip, json!({ "by": by, "name": name }))
            }
            InboundSignal::ChatEnded { by, name, reason } => (
                n.chat_ended,
                json!({ "by": by, "name": name, "reason": reason }),
            ),
            InboundSignal::WaitingForPeer => (n.waiting_peer, Value::Null),
            InboundSignal::PeerDisconnected { peer_id } => {
                (n.peer_disconnected, json!({ "peerId": peer_id }))
            }
            InboundSignal::RoomUsers(members) => (
                n.room_users,
                serde_json::to_value(members).map_err(|source| SignalError::Encode {
                    event: n.room_users,
                    source,
                })?,
            ),
            InboundSignal::Offer { offer, from } => {
                (n.offer, json!({ "offer": offer, "from": from }))
            }
            InboundSignal::Answer { answer, from } => {
                (n.answer, json!({ "answer": answer, "from": from }))
            }
            InboundSignal::IceCandidate { candidate, from } => (
                n.ice_candidate,
                json!({ "candidate": candidate, "from": from }),
            ),
            InboundSignal::RestartCall { from } => (n.restart_call, json!({ "from": from })),
        };
        Ok(encoded)
    }

    /// Decode a client → server event (used by the loopback server)
    pub fn decode_outbound(
        &self,
        event: &str,
        payload: Value,
    ) -> Result<OutboundSignal, SignalError> {
        let kind = self
            .outbound_kind(event)
            .ok_or_else(|| SignalError::UnknownEvent(event.to_string()))?;
        let malformed = |source| SignalError::Malformed {
            event: event.to_string(),
            source,
        };

        let signal = match kind {
            OutboundKind::EnterPool => OutboundSignal::EnterPool,
            OutboundKind::LeavePool => OutboundSignal::LeavePool,
            OutboundKind::Respond => {
                let p: ResponsePayload = parse(payload).map_err(malformed)?;
                OutboundSignal::Respond(p.response)
            }
            OutboundKind::HangUp => {
                let p: HangUpPayload = parse(payload).map_err(malformed)?;
                OutboundSignal::HangUp {
                    to: p.to,
                    name: p.name,
                    reason: p.reason,
                }
            }
            OutboundKind::JoinRoom => OutboundSignal::JoinRoom(parse(payload).map_err(malformed)?),
            OutboundKind::LeaveRoom => OutboundSignal::LeaveRoom,
            OutboundKind::Offer => {
                let p: OfferPayload = parse(payload).map_err(malformed)?;
                OutboundSignal::Offer {
                    to: p.from,
                    offer: p.offer,
                }
            }
            OutboundKind::Answer => {
                let p: AnswerPayload = parse(payload).map_err(malformed)?;
                OutboundSignal::Answer {
                    to: p.from,
                    answer: p.answer,
                }
            }
            OutboundKind::IceCandidate => {
                let p: CandidatePayload = parse(payload).map_err(malformed)?;
                OutboundSignal::IceCandidate {
                    to: p.from,
                    candidate: p.candidate,
                }
            }
            OutboundKind::RestartCall => {
                let p: RestartPayload = parse(payload).map_err(malformed)?;
                OutboundSignal::RestartCall { to: p.from }
            }
        };
        Ok(signal)
    }

    fn inbound_kind(&self, event: &str) -> Option<InboundKind> {
        let n = &self.names;
        [
            (n.match_found, InboundKind::MatchFound),
            (n.chat_start, InboundKind::ChatStart),
            (n.chat_skip, InboundKind::ChatSkip),
            (n.chat_ended, InboundKind::ChatEnded),
            (n.waiting_peer, InboundKind::WaitingForPeer),
            (n.peer_disconnected, InboundKind::PeerDisconnected),
            (n.room_users, InboundKind::RoomUsers),
            (n.offer, InboundKind::Offer),
            (n.answer, InboundKind::Answer),
            (n.ice_candidate, InboundKind::IceCandidate),
            (n.restart_call, InboundKind::RestartCall),
        ]
        .into_iter()
        .find(|(name, _)| *name == event)
        .map(|(_, kind)| kind)
    }

    fn outbound_kind(&self, event: &str) -> Option<OutboundKind> {
        let n = &self.names;
        [
            (n.enter_pool, OutboundKind::EnterPool),
            (n.leave_pool, OutboundKind::LeavePool),
            (n.user_response, OutboundKind::Respond),
            (n.chat_ended, OutboundKind::HangUp),
            (n.join_room, OutboundKind::JoinRoom),
            (n.leave_room, OutboundKind::LeaveRoom),
            (n.offer, OutboundKind::Offer),
            (n.answer, OutboundKind::Answer),
            (n.ice_candidate, OutboundKind::IceCandidate),
            (n.restart_call, OutboundKind::RestartCall),
        ]
        .into_iter()
        .find(|(name, _)| *name == event)
        .map(|(_, kind)| kind)
    }
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(payload)
}

/// Some events may arrive without any payload at all
fn parse_optional<T: DeserializeOwned + Default>(payload: Value) -> Result<T, serde_json::Error> {
    if payload.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(payload)
    }
}
