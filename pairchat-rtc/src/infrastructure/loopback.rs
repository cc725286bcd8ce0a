use crate::application::{EngineInput, EngineNotice, SessionEngine, UserIntent};
use crate::infrastructure::error::{EngineError, Result};
use crate::infrastructure::media::{MediaTrack, RemoteStream, TransportEvent, TransportState};
use crate::infrastructure::memory::{BackendTask, MemoryBackend, MemorySignaling, SentSignal};
use crate::infrastructure::message::{InboundSignal, MatchResponse, OutboundSignal, SignalCodec};
use instant::{Duration, Instant};
use pairchat_core::{
    EngineConfig, MediaFailure, PeerId, PeerInfo, RoomMember, SessionToken, TrackKind,
};
use std::collections::{HashMap, HashSet, VecDeque};

pub type LoopbackEngine = SessionEngine<MemorySignaling, MemoryBackend>;

/// Rounds `settle` runs before assuming the clients are ping-ponging forever
const MAX_SETTLE_ROUNDS: usize = 1_000;

#[derive(Debug, Clone)]
struct Pairing {
    peer: PeerId,
    accepted: bool,
}

/// Minimal matchmaking server: FIFO pool, pairwise accept, signal relay
#[derive(Debug, Default)]
struct PairingServer {
    pool: VecDeque<PeerId>,
    pairs: HashMap<PeerId, Pairing>,
    names: HashMap<PeerId, String>,
    room: Vec<RoomMember>,
    online: HashSet<PeerId>,
}

type Deliveries = Vec<(PeerId, InboundSignal)>;

impl PairingServer {
    fn register(&mut self, id: PeerId, name: String) {
        self.online.insert(id.clone());
        self.names.insert(id, name);
    }

    fn info(&self, id: &PeerId) -> PeerInfo {
        self.names
            .get(id)
            .map(|name| PeerInfo::named(name.clone()))
            .unwrap_or_default()
    }

    fn handle(&mut self, from: &PeerId, signal: OutboundSignal) -> Deliveries {
        match signal {
            OutboundSignal::EnterPool => self.enter_pool(from),
            OutboundSignal::LeavePool => {
                self.pool.retain(|id| id != from);
                Vec::new()
            }
            OutboundSignal::Respond(MatchResponse::Connect) => self.accept(from),
            OutboundSignal::Respond(MatchResponse::Skip) => {
                let mut out = Vec::new();
                if let Some(peer) = self.unpair(from) {
                    out.push((
                        peer,
                        InboundSignal::ChatSkip {
                            by: Some(from.clone()),
                            name: self.names.get(from).cloned(),
                        },
                    ));
                }
                out.extend(self.enter_pool(from));
                out
            }
            OutboundSignal::HangUp { to, name, reason } => {
                self.unpair(from);
                vec![(
                    to,
                    InboundSignal::ChatEnded {
                        by: Some(from.clone()),
                        name,
                        reason: Some(reason.as_str().to_string()),
                    },
                )]
            }
            OutboundSignal::JoinRoom(member) => {
                self.room.retain(|m| m.id != member.id);
                self.room.push(member);
                self.roster()
            }
            OutboundSignal::LeaveRoom => {
                self.room.retain(|m| m.id != from.as_str());
                self.roster()
            }
            OutboundSignal::Offer { to, offer } => vec![(
                to,
                InboundSignal::Offer {
                    offer,
                    from: from.clone(),
                },
            )],
            OutboundSignal::Answer { to, answer } => vec![(
                to,
                InboundSignal::Answer {
                    answer,
                    from: from.clone(),
                },
            )],
            OutboundSignal::IceCandidate { to, candidate } => vec![(
                to,
                InboundSignal::IceCandidate {
                    candidate,
                    from: from.clone(),
                },
            )],
            OutboundSignal::RestartCall { to } => vec![(
                to,
                InboundSignal::RestartCall {
                    from: from.clone(),
                },
            )],
        }
    }

    fn enter_pool(&mut self, id: &PeerId) -> Deliveries {
        self.unpair(id);
        if self.pool.contains(id) {
            return Vec::new();
        }

        let Some(position) = self.pool.iter().position(|other| other != id) else {
            self.pool.push_back(id.clone());
            return Vec::new();
        };
        let Some(other) = self.pool.remove(position) else {
            return Vec::new();
        };

        self.pairs.insert(
            id.clone(),
            Pairing {
                peer: other.clone(),
                accepted: false,
            },
        );
        self.pairs.insert(
            other.clone(),
            Pairing {
                peer: id.clone(),
                accepted: false,
            },
        );

        vec![
            (
                id.clone(),
                InboundSignal::MatchFound {
                    peer_id: other.clone(),
                    peer_info: self.info(&other),
                },
            ),
            (
                other,
                InboundSignal::MatchFound {
                    peer_id: id.clone(),
                    peer_info: self.info(id),
                },
            ),
        ]
    }

    fn accept(&mut self, from: &PeerId) -> Deliveries {
        let Some(pairing) = self.pairs.get_mut(from) else {
            return Vec::new();
        };
        pairing.accepted = true;
        let peer = pairing.peer.clone();

        let peer_accepted = self.pairs.get(&peer).is_some_and(|p| p.accepted);
        if peer_accepted {
            vec![
                (
                    from.clone(),
                    InboundSignal::ChatStart {
                        peer_id: Some(peer.clone()),
                    },
                ),
                (
                    peer,
                    InboundSignal::ChatStart {
                        peer_id: Some(from.clone()),
                    },
                ),
            ]
        } else {
            vec![(from.clone(), InboundSignal::WaitingForPeer)]
        }
    }

    fn unpair(&mut self, id: &PeerId) -> Option<PeerId> {
        let pairing = self.pairs.remove(id)?;
        self.pairs.remove(&pairing.peer);
        Some(pairing.peer)
    }

    fn roster(&self) -> Deliveries {
        self.online
            .iter()
            .map(|id| (id.clone(), InboundSignal::RoomUsers(self.room.clone())))
            .collect()
    }

    fn disconnect(&mut self, id: &PeerId) -> Deliveries {
        self.online.remove(id);
        self.pool.retain(|other| other != id);
        self.room.retain(|m| m.id != id.as_str());
        match self.unpair(id) {
            Some(peer) => vec![(
                peer,
                InboundSignal::PeerDisconnected {
                    peer_id: id.clone(),
                },
            )],
            None => Vec::new(),
        }
    }
}

struct Client {
    id: PeerId,
    engine: LoopbackEngine,
    channel: MemorySignaling,
    backend: MemoryBackend,
    online: bool,
    auto_connect: bool,
    hold_media: bool,
    media_failure: Option<MediaFailure>,
    held: Vec<BackendTask>,
    announced: HashSet<SessionToken>,
    emitted: Vec<String>,
    notices: Vec<EngineNotice>,
}

impl Client {
    fn collect_notices(&mut self) {
        self.notices.extend(self.engine.drain_notices());
    }
}

/// Several engines wired to an in-process pairing server on a virtual clock
///
/// Backend work completes instantly during `settle`, and a transport reports
/// `connected` as soon as both of its descriptions are in place.
pub struct Switchboard {
    config: EngineConfig,
    codec: SignalCodec,
    server: PairingServer,
    clients: Vec<Client>,
    now: Instant,
    log: Vec<String>,
}

impl Switchboard {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            codec: SignalCodec::new(config.profile),
            config,
            server: PairingServer::default(),
            clients: Vec::new(),
            now: Instant::now(),
            log: Vec::new(),
        }
    }

    /// Connect a new client with identity `id` and display name `name`
    pub fn add_client(&mut self, id: &str, name: &str) -> Result<()> {
        let peer = PeerId::from(id);
        if self.index(&peer).is_ok() {
            return Err(EngineError::DuplicateClient(id.to_string()));
        }

        let channel = MemorySignaling::new(peer.clone());
        let backend = MemoryBackend::new(id);
        let config = self.config.clone().with_display_name(name);
        let engine = SessionEngine::new(config, channel.clone(), backend.clone())?;

        self.server.register(peer.clone(), name.to_string());
        tracing::debug!("➕ Client {} ({}) connected", id, name);
        self.clients.push(Client {
            id: peer,
            engine,
            channel,
            backend,
            online: true,
            auto_connect: true,
            hold_media: false,
            media_failure: None,
            held: Vec::new(),
            announced: HashSet::new(),
            emitted: Vec::new(),
            notices: Vec::new(),
        });
        Ok(())
    }

    /// Deliver a user intent and let everything settle
    pub fn intent(&mut self, id: &str, intent: UserIntent) -> Result<()> {
        let index = self.index(&PeerId::from(id))?;
        self.log.push(format!("👆 {} {:?}", id, intent));
        let now = self.now;
        self.clients[index]
            .engine
            .handle(EngineInput::Intent(intent), now);
        self.settle();
        Ok(())
    }

    /// Run until no client has anything left to do
    ///
    /// Returns the number of rounds that made progress.
    pub fn settle(&mut self) -> usize {
        let mut rounds = 0;
        loop {
            let mut progressed = false;
            progressed |= self.route_signals();
            progressed |= self.run_backends();
            progressed |= self.announce_connections();
            for client in &mut self.clients {
                client.collect_notices();
            }

            if !progressed {
                break;
            }
            rounds += 1;
            if rounds >= MAX_SETTLE_ROUNDS {
                tracing::warn!("⚠️ Switchboard did not settle after {} rounds", rounds);
                break;
            }
        }
        rounds
    }

    /// Move the virtual clock forward, firing every deadline on the way
    pub fn advance(&mut self, by: Duration) {
        let target = self.now + by;
        while let Some(next) = self.next_deadline().filter(|at| *at <= target) {
            self.now = self.now.max(next);
            self.fire_due();
        }
        self.now = target;
    }

    /// Jump straight to the earliest pending deadline; false if there is none
    pub fn advance_to_next_deadline(&mut self) -> bool {
        match self.next_deadline() {
            Some(next) => {
                self.now = self.now.max(next);
                self.fire_due();
                true
            }
            None => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.clients
            .iter()
            .filter_map(|client| client.engine.poll_timeout())
            .min()
    }

    fn fire_due(&mut self) {
        let now = self.now;
        for client in &mut self.clients {
            if client.engine.poll_timeout().is_some_and(|at| at <= now) {
                client.engine.handle_timeout(now);
            }
        }
        self.settle();
    }

    /// Both ends of `id`'s current chat see their transport fail
    pub fn drop_link(&mut self, id: &str) -> Result<()> {
        let index = self.index(&PeerId::from(id))?;
        let mut affected = vec![index];
        if let Some(session) = self.clients[index].engine.session() {
            if let Ok(peer) = self.index(session.peer()) {
                affected.push(peer);
            }
        }

        self.log.push(format!("💥 link of {} dropped", id));
        for index in affected {
            self.fail_transport_of(index);
        }
        self.settle();
        Ok(())
    }

    /// Only `id` sees its transport fail; the peer still thinks all is well
    pub fn fail_transport(&mut self, id: &str) -> Result<()> {
        let index = self.index(&PeerId::from(id))?;
        self.log.push(format!("💥 transport of {} failed", id));
        self.fail_transport_of(index);
        self.settle();
        Ok(())
    }

    fn fail_transport_of(&mut self, index: usize) {
        let now = self.now;
        let client = &mut self.clients[index];
        if let Some(token) = client.engine.token() {
            client.engine.handle(
                EngineInput::Transport {
                    token,
                    event: TransportEvent::StateChanged(TransportState::Failed),
                },
                now,
            );
        }
    }

    /// `id` loses its signaling connection
    pub fn disconnect(&mut self, id: &str) -> Result<()> {
        let peer = PeerId::from(id);
        let index = self.index(&peer)?;
        self.log.push(format!("📴 {} disconnected", id));

        let deliveries = self.server.disconnect(&peer);
        let now = self.now;
        let client = &mut self.clients[index];
        client.online = false;
        client.channel.clear();
        client.engine.handle(EngineInput::ChannelLost, now);

        self.deliver(deliveries);
        self.settle();
        Ok(())
    }

    /// Whether a client's transports report `connected` once negotiated
    pub fn set_auto_connect(&mut self, id: &str, enabled: bool) -> Result<()> {
        let index = self.index(&PeerId::from(id))?;
        self.clients[index].auto_connect = enabled;
        Ok(())
    }

    /// Make every following media request of `id` fail
    pub fn set_media_failure(&mut self, id: &str, failure: Option<MediaFailure>) -> Result<()> {
        let index = self.index(&PeerId::from(id))?;
        self.clients[index].media_failure = failure;
        Ok(())
    }

    /// Keep media requests of `id` pending until `release_media`
    pub fn hold_media(&mut self, id: &str, hold: bool) -> Result<()> {
        let index = self.index(&PeerId::from(id))?;
        self.clients[index].hold_media = hold;
        Ok(())
    }

    /// Complete every held media request of `id`
    pub fn release_media(&mut self, id: &str) -> Result<()> {
        let index = self.index(&PeerId::from(id))?;
        let now = self.now;
        let client = &mut self.clients[index];
        for task in std::mem::take(&mut client.held) {
            let input = client.backend.complete(task);
            client.engine.handle(input, now);
        }
        self.settle();
        Ok(())
    }

    pub fn engine(&self, id: &str) -> Result<&LoopbackEngine> {
        let index = self.index(&PeerId::from(id))?;
        Ok(&self.clients[index].engine)
    }

    pub fn backend(&self, id: &str) -> Result<&MemoryBackend> {
        let index = self.index(&PeerId::from(id))?;
        Ok(&self.clients[index].backend)
    }

    /// Events `id` has emitted so far, oldest first
    pub fn emitted(&self, id: &str) -> Result<Vec<String>> {
        let index = self.index(&PeerId::from(id))?;
        Ok(self.clients[index].emitted.clone())
    }

    pub fn count_emitted(&self, id: &str, event: &str) -> Result<usize> {
        Ok(self.emitted(id)?.iter().filter(|e| *e == event).count())
    }

    pub fn drain_notices(&mut self, id: &str) -> Result<Vec<EngineNotice>> {
        let index = self.index(&PeerId::from(id))?;
        Ok(std::mem::take(&mut self.clients[index].notices))
    }

    /// Human readable trace of everything that crossed the switchboard
    pub fn take_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn client_ids(&self) -> Vec<PeerId> {
        self.clients.iter().map(|client| client.id.clone()).collect()
    }

    fn index(&self, id: &PeerId) -> Result<usize> {
        self.clients
            .iter()
            .position(|client| &client.id == id)
            .ok_or_else(|| EngineError::UnknownClient(id.to_string()))
    }

    fn route_signals(&mut self) -> bool {
        let mut progressed = false;
        for index in 0..self.clients.len() {
            let sent: Vec<SentSignal> = self.clients[index].channel.take_sent();
            if !self.clients[index].online {
                continue;
            }
            let from = self.clients[index].id.clone();

            for SentSignal { event, payload } in sent {
                progressed = true;
                self.clients[index].emitted.push(event.clone());
                self.log.push(format!("📤 {} → {}", from, event));

                match self.codec.decode_outbound(&event, payload) {
                    Ok(signal) => {
                        let deliveries = self.server.handle(&from, signal);
                        self.deliver(deliveries);
                    }
                    Err(e) => tracing::warn!("⚠️ Server rejected {} from {}: {}", event, from, e),
                }
            }
        }
        progressed
    }

    fn deliver(&mut self, deliveries: Deliveries) {
        let now = self.now;
        for (to, signal) in deliveries {
            let Ok(index) = self.index(&to) else {
                tracing::debug!("🚫 Dropping signal for unknown client {}", to);
                continue;
            };
            if !self.clients[index].online {
                continue;
            }

            match self.codec.encode_inbound(&signal) {
                Ok((event, payload)) => {
                    self.log.push(format!("📥 {} ← {}", to, event));
                    self.clients[index]
                        .engine
                        .handle(EngineInput::signal(event, payload), now);
                }
                Err(e) => tracing::warn!("⚠️ Failed to encode signal for {}: {}", to, e),
            }
        }
    }

    fn run_backends(&mut self) -> bool {
        let now = self.now;
        let mut progressed = false;

        for client in &mut self.clients {
            for task in client.backend.take_tasks() {
                progressed = true;
                let is_media = matches!(task, BackendTask::AcquireMedia { .. });
                if is_media && client.hold_media {
                    client.held.push(task);
                    continue;
                }
                let input = match (&client.media_failure, is_media) {
                    (Some(failure), true) => client.backend.fail(&task, failure.clone()),
                    _ => Some(client.backend.complete(task)),
                };
                if let Some(input) = input {
                    client.engine.handle(input, now);
                }
            }
        }
        progressed
    }

    fn announce_connections(&mut self) -> bool {
        let now = self.now;
        let kinds = self.config.media.kinds();
        let mut progressed = false;

        for client in &mut self.clients {
            if !client.auto_connect {
                continue;
            }
            let Some(token) = client.engine.token() else {
                continue;
            };
            if client.announced.contains(&token) {
                continue;
            }
            let negotiated = client
                .backend
                .transports()
                .iter()
                .any(|t| t.token() == token && t.is_negotiated());
            if !negotiated {
                continue;
            }

            client.announced.insert(token);
            progressed = true;

            let peer = client
                .engine
                .session()
                .map(|session| session.peer().to_string())
                .unwrap_or_default();
            let mut tracks = Vec::new();
            if kinds.audio {
                tracks.push(MediaTrack::new(format!("{}-audio", peer), TrackKind::Audio));
            }
            if kinds.video {
                tracks.push(MediaTrack::new(format!("{}-video", peer), TrackKind::Video));
            }

            for event in [
                TransportEvent::StateChanged(TransportState::Connecting),
                TransportEvent::StateChanged(TransportState::Connected),
                TransportEvent::RemoteStream(RemoteStream {
                    id: format!("{}-stream", peer),
                    tracks,
                }),
            ] {
                client
                    .engine
                    .handle(EngineInput::Transport { token, event }, now);
            }
        }
        progressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairchat_core::{MatchState, Phase};

    fn pair() -> Switchboard {
        let mut board = Switchboard::new(EngineConfig::voice());
        board.add_client("alice", "Alice").unwrap();
        board.add_client("bob", "Bob").unwrap();
        board
    }

    fn connect(board: &mut Switchboard) {
        board.intent("alice", UserIntent::StartSearch).unwrap();
        board.intent("bob", UserIntent::StartSearch).unwrap();
        board.intent("alice", UserIntent::Accept).unwrap();
        board.intent("bob", UserIntent::Accept).unwrap();
    }

    #[test]
    fn test_two_clients_connect() {
        let mut board = pair();
        connect(&mut board);

        for id in ["alice", "bob"] {
            let engine = board.engine(id).unwrap();
            assert_eq!(engine.state(), MatchState::Chatting);
            assert_eq!(engine.phase(), &Phase::Connected);
        }
        assert_eq!(board.count_emitted("alice", "offer").unwrap(), 1);
        assert_eq!(board.count_emitted("bob", "answer").unwrap(), 1);
        assert_eq!(board.count_emitted("bob", "offer").unwrap(), 0);
        assert!(board.backend("bob").unwrap().remote_stream().is_some());
    }

    #[test]
    fn test_second_accept_waits() {
        let mut board = pair();
        board.intent("alice", UserIntent::StartSearch).unwrap();
        board.intent("bob", UserIntent::StartSearch).unwrap();
        board.intent("alice", UserIntent::Accept).unwrap();

        assert_eq!(board.engine("alice").unwrap().state(), MatchState::Waiting);
        assert_eq!(board.engine("bob").unwrap().state(), MatchState::Matched);
    }

    #[test]
    fn test_skip_returns_both_to_search() {
        let mut board = pair();
        board.intent("alice", UserIntent::StartSearch).unwrap();
        board.intent("bob", UserIntent::StartSearch).unwrap();
        board.drain_notices("bob").unwrap();

        board.intent("alice", UserIntent::Skip).unwrap();

        // Both re-enter the pool and get matched again
        assert_eq!(board.engine("alice").unwrap().state(), MatchState::Matched);
        assert_eq!(board.engine("bob").unwrap().state(), MatchState::Matched);
        assert!(board
            .drain_notices("bob")
            .unwrap()
            .contains(&EngineNotice::SystemMessage("Alice skipped the chat.".to_string())));
    }

    #[test]
    fn test_link_drop_recovers_after_retry() {
        let mut board = pair();
        connect(&mut board);

        board.drop_link("alice").unwrap();
        assert!(matches!(
            board.engine("alice").unwrap().phase(),
            Phase::Retrying { attempt: 1, .. }
        ));

        board.advance(Duration::from_millis(2_000));
        for id in ["alice", "bob"] {
            let engine = board.engine(id).unwrap();
            assert_eq!(engine.phase(), &Phase::Connected);
            assert_eq!(engine.retry_context().attempt, 0);
        }
        assert_eq!(board.count_emitted("alice", "offer").unwrap(), 2);
    }

    #[test]
    fn test_disconnect_notifies_peer() {
        let mut board = pair();
        connect(&mut board);

        board.disconnect("bob").unwrap();
        assert_eq!(board.engine("alice").unwrap().state(), MatchState::Idle);
        assert_eq!(board.engine("bob").unwrap().state(), MatchState::Idle);
        assert!(!board.engine("alice").unwrap().has_transport());
    }

    #[test]
    fn test_unknown_client() {
        let mut board = pair();
        assert!(matches!(
            board.intent("carol", UserIntent::StartSearch),
            Err(EngineError::UnknownClient(_))
        ));
    }
}
