use crate::application::monitor::{ConnectionMonitor, MonitorTimer, Verdict};
use crate::application::negotiator::SessionNegotiator;
use crate::application::queue::SignalQueue;
use crate::application::resources::{Attach, ResourceLifecycle};
use crate::infrastructure::error::Result;
use crate::infrastructure::media::{
    LocalMedia, MediaBackend, OfferOptions, RemoteStream, TransportConfig, TransportError,
    TransportEvent,
};
use crate::infrastructure::message::{
    InboundSignal, MatchResponse, OutboundSignal, SessionDescription, SignalCodec,
};
use crate::infrastructure::signaling::SignalingChannel;
use instant::Instant;
use pairchat_core::{
    ConnectionError, ConnectionState, EngineConfig, MatchEffect, MatchError, MatchEvent,
    MatchState, Matchmaker, MediaFailure, PeerId, PeerInfo, Phase, RetryContext, RoomMember,
    Session, SessionToken, TrackKind, Transition,
};
use serde_json::Value;
use std::collections::VecDeque;

/// Something the local user asked for
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    StartSearch,
    StopSearch,
    Accept,
    Skip,
    HangUp,
    /// Restart a failed chat with a fresh retry budget
    RetryNow,
    /// Give up on a failed chat and return to idle
    Dismiss,
    SetMuted(bool),
    SetCamera(bool),
    JoinRoom(RoomMember),
    LeaveRoom,
}

/// Every stimulus the engine reacts to
#[derive(Debug)]
pub enum EngineInput<M> {
    Intent(UserIntent),
    /// The signaling channel (re)connected and assigned us an identity
    ChannelConnected { local_id: PeerId },
    /// Raw named event from the signaling server
    Signal { event: String, payload: Value },
    ChannelLost,
    MediaResolved {
        token: SessionToken,
        result: std::result::Result<M, MediaFailure>,
    },
    DescriptionCreated {
        token: SessionToken,
        result: std::result::Result<SessionDescription, TransportError>,
    },
    Transport {
        token: SessionToken,
        event: TransportEvent,
    },
}

impl<M> EngineInput<M> {
    pub fn intent(intent: UserIntent) -> Self {
        EngineInput::Intent(intent)
    }

    pub fn signal(event: impl Into<String>, payload: Value) -> Self {
        EngineInput::Signal {
            event: event.into(),
            payload,
        }
    }
}

/// Output for the UI, drained with `SessionEngine::drain_notices`
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    PhaseChanged(Phase),
    SystemMessage(String),
    RoomUsers(Vec<RoomMember>),
    MatchProposed { peer: PeerId, info: PeerInfo },
    RemoteStreamAttached(RemoteStream),
    RemoteStreamCleared,
    LocalTrackToggled { kind: TrackKind, enabled: bool },
}

/// The peer-session engine
///
/// Sans-I/O: feed it `EngineInput`s with `handle`, wake it at
/// `poll_timeout` with `handle_timeout`, and collect notices. Outbound
/// signals are queued while a handler runs and flushed to the channel when
/// it returns.
pub struct SessionEngine<C: SignalingChannel, B: MediaBackend> {
    config: EngineConfig,
    codec: SignalCodec,
    channel: C,
    matchmaker: Matchmaker,
    resources: ResourceLifecycle<B>,
    negotiator: SessionNegotiator,
    monitor: ConnectionMonitor,
    outbox: SignalQueue,
    token: Option<SessionToken>,
    generation: u64,
    phase: Phase,
    notices: VecDeque<EngineNotice>,
}

impl<C: SignalingChannel, B: MediaBackend> SessionEngine<C, B> {
    pub fn new(config: EngineConfig, channel: C, backend: B) -> Result<Self> {
        config.validate()?;

        let mut matchmaker = Matchmaker::new();
        if let Some(local_id) = channel.local_id() {
            matchmaker.set_local_id(local_id);
        }

        tracing::info!(
            "🚀 Session engine ready ({:?} profile, {} ICE servers)",
            config.profile,
            config.ice_servers.len()
        );

        Ok(Self {
            codec: SignalCodec::new(config.profile),
            negotiator: SessionNegotiator::new(config.ice_buffer_limit),
            monitor: ConnectionMonitor::new(config.retry_policy(), config.connect_timeout()),
            resources: ResourceLifecycle::new(backend),
            outbox: SignalQueue::default(),
            matchmaker,
            channel,
            config,
            token: None,
            generation: 0,
            phase: Phase::Idle,
            notices: VecDeque::new(),
        })
    }

    /// Process one input
    pub fn handle(&mut self, input: EngineInput<B::Media>, now: Instant) {
        match input {
            EngineInput::Intent(intent) => self.on_intent(intent, now),
            EngineInput::ChannelConnected { local_id } => {
                tracing::info!("🔗 Signaling channel connected as {}", local_id);
                self.matchmaker.set_local_id(local_id);
            }
            EngineInput::Signal { event, payload } => match self.codec.decode(&event, payload) {
                Ok(signal) => self.on_signal(signal, now),
                Err(e) => tracing::warn!("⚠️ Dropping signal: {}", e),
            },
            EngineInput::ChannelLost => {
                tracing::warn!("📴 Lost the signaling channel");
                self.apply(MatchEvent::ChannelLost, now);
            }
            EngineInput::MediaResolved { token, result } => self.on_media(token, result, now),
            EngineInput::DescriptionCreated { token, result } => {
                self.on_description(token, result, now)
            }
            EngineInput::Transport { token, event } => self.on_transport(token, event, now),
        }

        self.flush(now);
        self.refresh_phase();
    }

    /// Earliest instant at which `handle_timeout` has work to do
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.monitor.poll_timeout()
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        match self.monitor.handle_timeout(now) {
            Some(MonitorTimer::Retry) => {
                let retry = self.monitor.retry_context();
                tracing::info!(
                    "🔄 Retrying connection ({}/{})",
                    retry.attempt,
                    retry.max_attempts
                );
                self.restart(now);
                self.request_offer();
            }
            Some(MonitorTimer::ConnectTimeout) => {
                tracing::warn!("⏰ Connection was not established in time");
                self.fail(ConnectionError::connection_timeout(), now);
            }
            None => {}
        }

        self.flush(now);
        self.refresh_phase();
    }

    pub fn drain_notices(&mut self) -> Vec<EngineNotice> {
        self.notices.drain(..).collect()
    }

    fn on_intent(&mut self, intent: UserIntent, now: Instant) {
        tracing::debug!("👆 Intent {:?}", intent);
        match intent {
            UserIntent::StartSearch => {
                self.apply(MatchEvent::StartSearch, now);
            }
            UserIntent::StopSearch => {
                self.apply(MatchEvent::StopSearch, now);
            }
            UserIntent::Accept => {
                self.apply(MatchEvent::Accept, now);
            }
            UserIntent::Skip => {
                self.apply(MatchEvent::Skip, now);
            }
            UserIntent::HangUp => {
                self.apply(MatchEvent::HangUp, now);
            }
            UserIntent::RetryNow => {
                if !self.matchmaker.is_chatting() {
                    tracing::debug!("🚫 Nothing to retry in {}", self.matchmaker.state());
                    return;
                }
                tracing::info!("🔄 Manual retry");
                self.monitor.retry_now();
                self.restart(now);
                self.request_offer();
            }
            UserIntent::Dismiss => {
                if !self.matchmaker.is_chatting() || !self.monitor.is_failed() {
                    tracing::debug!("🚫 Nothing to dismiss");
                    return;
                }
                self.apply(MatchEvent::RetryExhausted, now);
            }
            UserIntent::SetMuted(muted) => self.toggle_track(TrackKind::Audio, !muted),
            UserIntent::SetCamera(enabled) => self.toggle_track(TrackKind::Video, enabled),
            UserIntent::JoinRoom(member) => self.send(OutboundSignal::JoinRoom(member)),
            UserIntent::LeaveRoom => self.send(OutboundSignal::LeaveRoom),
        }
    }

    fn on_signal(&mut self, signal: InboundSignal, now: Instant) {
        match signal {
            InboundSignal::MatchFound { peer_id, peer_info } => {
                if self.matchmaker.local_id().is_none() {
                    if let Some(local_id) = self.channel.local_id() {
                        self.matchmaker.set_local_id(local_id);
                    }
                }
                let proposed = (peer_id.clone(), peer_info.clone());
                let opened = self
                    .apply(
                        MatchEvent::MatchFound {
                            peer: peer_id,
                            info: peer_info,
                        },
                        now,
                    )
                    .is_some_and(|t| t.opened.is_some());
                if opened {
                    let (peer, info) = proposed;
                    tracing::info!("🎯 Matched with {} ({})", peer, info.display_name());
                    self.notices
                        .push_back(EngineNotice::MatchProposed { peer, info });
                }
            }
            InboundSignal::ChatStart { peer_id } => {
                self.apply(MatchEvent::BothAccepted { peer: peer_id }, now);
            }
            InboundSignal::ChatSkip { by, name } => {
                if self.is_foreign(by.as_ref()) {
                    return;
                }
                self.apply(MatchEvent::PeerSkipped { name }, now);
            }
            InboundSignal::ChatEnded { by, name, reason } => {
                if self.is_foreign(by.as_ref()) {
                    return;
                }
                self.apply(MatchEvent::PeerHungUp { name, reason }, now);
            }
            InboundSignal::WaitingForPeer => {
                self.apply(MatchEvent::WaitingForPeer, now);
            }
            InboundSignal::PeerDisconnected { peer_id } => {
                self.apply(MatchEvent::PeerDisconnected { peer: peer_id }, now);
            }
            InboundSignal::RoomUsers(members) => {
                tracing::debug!("👥 Room roster: {} users", members.len());
                self.notices.push_back(EngineNotice::RoomUsers(members));
            }
            InboundSignal::Offer { offer, from } => self.on_offer(offer, from, now),
            InboundSignal::RestartCall { from } => self.on_restart_call(from, now),
            InboundSignal::Answer { answer, from } => {
                if !self.negotiating() {
                    tracing::debug!("🚫 Answer from {} outside a chat", from);
                    return;
                }
                let result =
                    self.negotiator
                        .on_remote_answer(answer, &from, self.resources.transport_mut());
                if let Err(error) = result {
                    self.fail(error, now);
                }
            }
            InboundSignal::IceCandidate { candidate, from } => {
                if !self.negotiating() {
                    tracing::debug!("🚫 Candidate from {} outside a chat", from);
                    return;
                }
                self.negotiator
                    .on_remote_candidate(candidate, &from, self.resources.transport_mut());
            }
        }
    }

    fn on_offer(&mut self, offer: SessionDescription, from: PeerId, now: Instant) {
        if !self.matchmaker.is_chatting() {
            tracing::debug!("🚫 Offer from {} outside a chat", from);
            return;
        }

        // A new offer from our initiator means it started over
        if self.is_responder_to(&from) {
            match self.token {
                None if self.monitor.is_failed() => {
                    tracing::info!("🔄 {} restarted the failed call", from);
                    self.monitor.retry_now();
                    self.restart(now);
                }
                Some(_) if self.negotiator.is_duplicate_offer(&offer) => {
                    tracing::debug!("🔁 Ignoring duplicate offer from {}", from);
                    return;
                }
                Some(_) if self.negotiator.has_remote_offer() || self.monitor.retry_pending() => {
                    tracing::info!("🔄 New offer from {}, renegotiating", from);
                    self.restart(now);
                }
                _ => {}
            }
        }

        if self.token.is_none() {
            tracing::debug!("🚫 Offer from {} without a connection attempt", from);
            return;
        }
        let result = self
            .negotiator
            .on_remote_offer(offer, &from, self.resources.transport_mut());
        if let Err(error) = result {
            self.fail(error, now);
        }
    }

    /// The responder started over and needs a fresh offer from us
    fn on_restart_call(&mut self, from: PeerId, now: Instant) {
        let asked_by_peer = self.matchmaker.is_chatting()
            && self
                .matchmaker
                .session()
                .is_some_and(|session| session.peer() == &from && session.is_initiator());
        if !asked_by_peer {
            tracing::debug!("🚫 Ignoring restart request from {}", from);
            return;
        }

        if self.token.is_none() {
            tracing::info!("🔄 {} restarted the failed call", from);
            self.monitor.retry_now();
        } else if !self.negotiator.offer_sent() {
            tracing::debug!("📝 Offer for {} is already on its way", from);
            return;
        } else {
            tracing::info!("🔄 {} asked for a new offer", from);
        }
        self.restart(now);
    }

    /// After restarting on our own, the responder has to ask for an offer
    fn request_offer(&mut self) {
        if self.token.is_none() {
            return;
        }
        let Some(session) = self.matchmaker.session() else {
            return;
        };
        if session.is_initiator() {
            return;
        }
        let to = session.peer().clone();
        tracing::debug!("📨 Asking {} for a new offer", to);
        self.send(OutboundSignal::RestartCall { to });
    }

    fn on_media(
        &mut self,
        token: SessionToken,
        result: std::result::Result<B::Media, MediaFailure>,
        now: Instant,
    ) {
        if !self.is_current(token) {
            tracing::debug!("🗑️ Discarding media resolved for stale token {}", token);
            if let Ok(mut media) = result {
                media.stop();
            }
            return;
        }

        let media = match result {
            Ok(media) => media,
            Err(failure) => {
                let error = failure.into_error(self.config.media.kinds());
                self.fail(error, now);
                return;
            }
        };

        let transport_config = TransportConfig {
            ice_servers: self.config.ice_servers.clone(),
            ice_candidate_pool_size: self.config.ice_candidate_pool_size,
        };

        match self.resources.attach(token, media, &transport_config) {
            Ok(Attach::Installed) => {
                let result = match self.resources.transport_mut() {
                    Some(transport) => self.negotiator.on_transport_ready(transport),
                    None => Ok(()),
                };
                if let Err(error) = result {
                    self.fail(error, now);
                }
            }
            Ok(Attach::Stale) => {}
            Err(error) => self.fail(error, now),
        }
    }

    fn on_description(
        &mut self,
        token: SessionToken,
        result: std::result::Result<SessionDescription, TransportError>,
        now: Instant,
    ) {
        if !self.is_current(token) {
            tracing::debug!("🗑️ Discarding description for stale token {}", token);
            return;
        }
        let result = self.negotiator.on_description_created(
            result,
            self.resources.transport_mut(),
            &mut self.outbox,
        );
        if let Err(error) = result {
            self.fail(error, now);
        }
    }

    fn on_transport(&mut self, token: SessionToken, event: TransportEvent, now: Instant) {
        if !self.is_current(token) {
            tracing::debug!("🗑️ Discarding transport event for stale token {}", token);
            return;
        }

        match event {
            TransportEvent::StateChanged(state) => {
                tracing::debug!("📶 Transport {} for {}", state, token);
                if let Some(error) = self.monitor.on_transport_state(state, now) {
                    self.fail(error, now);
                }
            }
            TransportEvent::GatheringChanged(state) => {
                tracing::debug!("🧊 ICE gathering {:?}", state);
            }
            TransportEvent::LocalCandidate(candidate) => {
                if let Err(error) = self
                    .negotiator
                    .on_local_candidate(candidate, &mut self.outbox)
                {
                    self.fail(error, now);
                }
            }
            TransportEvent::RemoteStream(stream) => {
                tracing::info!("🔊 Remote stream {} attached", stream.id);
                self.resources.attach_remote(&stream);
                self.notices
                    .push_back(EngineNotice::RemoteStreamAttached(stream));
            }
        }
    }

    /// Run one event through the matchmaker and execute its effects
    fn apply(&mut self, event: MatchEvent, now: Instant) -> Option<Transition> {
        let name = event.name();
        let transition = match self.matchmaker.apply(event) {
            Ok(transition) => transition,
            Err(MatchError::InvalidTransition { state, event }) => {
                tracing::debug!("🚫 Ignoring {} in {}", event, state);
                return None;
            }
            Err(MatchError::UnknownPeer(peer)) => {
                tracing::debug!("🚫 Ignoring {} about {}", name, peer);
                return None;
            }
            Err(e) => {
                tracing::warn!("⚠️ Rejected {}: {}", name, e);
                return None;
            }
        };

        if transition.opened.is_some() {
            self.monitor.reset_for_session();
        }

        for effect in transition.effects.iter().cloned() {
            self.execute(effect, now);
        }

        if let Some(message) = transition
            .closed
            .as_ref()
            .and_then(|closed| closed.end.message())
        {
            self.notices.push_back(EngineNotice::SystemMessage(message));
        }

        Some(transition)
    }

    fn execute(&mut self, effect: MatchEffect, now: Instant) {
        match effect {
            MatchEffect::EnterPool => self.send(OutboundSignal::EnterPool),
            MatchEffect::LeavePool => self.send(OutboundSignal::LeavePool),
            MatchEffect::AcceptMatch => self.send(OutboundSignal::Respond(MatchResponse::Connect)),
            MatchEffect::SkipMatch => self.send(OutboundSignal::Respond(MatchResponse::Skip)),
            MatchEffect::SendHangUp { to, reason } => self.send(OutboundSignal::HangUp {
                to,
                name: self.config.display_name.clone(),
                reason,
            }),
            MatchEffect::StartChat => {
                self.monitor.reset_for_session();
                self.restart(now);
            }
            MatchEffect::Teardown => self.teardown(),
        }
    }

    /// Start a fresh attempt: new generation, new media, new transport
    fn restart(&mut self, now: Instant) {
        self.release();

        let Some(session) = self.matchmaker.session() else {
            tracing::warn!("⚠️ No session to connect");
            return;
        };
        let peer = session.peer().clone();
        let initiator = session.is_initiator();

        self.generation += 1;
        let token = SessionToken::new(session.id(), self.generation);
        self.token = Some(token);

        tracing::info!(
            "📞 Connecting to {} as {} ({})",
            peer,
            if initiator { "initiator" } else { "responder" },
            token
        );

        self.monitor.begin_attempt(now);
        self.negotiator.reset(
            token,
            peer,
            initiator,
            OfferOptions::from(self.config.media.kinds()),
        );
        self.resources.acquire(token, &self.config.media);
    }

    /// Leave the chat: release everything and forget the connection
    fn teardown(&mut self) {
        self.release();
        self.monitor.reset_for_session();
    }

    /// Release media and transport and invalidate in-flight continuations
    fn release(&mut self) {
        let had_remote = self.resources.has_remote_stream();
        if self.resources.teardown() {
            tracing::info!("🧹 Released media and transport");
        }
        if had_remote {
            self.notices.push_back(EngineNotice::RemoteStreamCleared);
        }
        self.negotiator.clear();
        self.token = None;
    }

    /// Hand a failure to the monitor; only meaningful while chatting
    fn fail(&mut self, error: ConnectionError, now: Instant) {
        if !error.is_fatal() {
            tracing::warn!("⚠️ {}", error);
            return;
        }
        if !self.matchmaker.is_chatting() {
            tracing::warn!("⚠️ {} (not chatting, ignored)", error);
            return;
        }

        match self.monitor.report(error, now) {
            Verdict::Ignored | Verdict::Retry { .. } => {}
            Verdict::Terminal(error) => {
                tracing::warn!("🛑 Connection failed for good: {}", error.message);
                self.release();
            }
        }
    }

    fn toggle_track(&mut self, kind: TrackKind, enabled: bool) {
        if self.resources.set_track_enabled(kind, enabled) {
            tracing::info!(
                "{} {} {}",
                if enabled { "🔈" } else { "🔇" },
                kind,
                if enabled { "enabled" } else { "disabled" }
            );
            self.notices
                .push_back(EngineNotice::LocalTrackToggled { kind, enabled });
        } else {
            tracing::debug!("🚫 No local {} track to toggle", kind);
        }
    }

    fn send(&mut self, signal: OutboundSignal) {
        if let Err(e) = self.outbox.push(signal) {
            tracing::warn!("⚠️ Dropping outbound signal: {}", e);
        }
    }

    /// Write queued signals to the channel
    fn flush(&mut self, now: Instant) {
        for signal in self.outbox.drain() {
            let (event, payload) = match self.codec.encode(&signal) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::warn!("⚠️ Failed to encode {}: {}", signal.name(), e);
                    continue;
                }
            };

            tracing::debug!("📤 {}", event);
            if let Err(e) = self.channel.emit(event, payload) {
                if self.matchmaker.is_chatting() {
                    self.fail(
                        ConnectionError::signaling("Failed to reach the signaling server.")
                            .with_detail(e.to_string()),
                        now,
                    );
                } else {
                    tracing::warn!("⚠️ Failed to send {}: {}", event, e);
                }
            }
        }
    }

    fn refresh_phase(&mut self) {
        let retry = self.monitor.retry_context();
        let phase = Phase::resolve(
            self.matchmaker.state(),
            self.monitor.state(),
            &retry,
            self.monitor.retry_pending(),
            self.monitor.last_error(),
        );
        if phase == self.phase {
            return;
        }

        tracing::info!("📣 {} → {}", self.phase, phase);
        if matches!(phase, Phase::Retrying { .. } | Phase::Failed { .. }) {
            self.notices
                .push_back(EngineNotice::SystemMessage(phase.feedback()));
        }
        self.notices
            .push_back(EngineNotice::PhaseChanged(phase.clone()));
        self.phase = phase;
    }

    fn is_current(&self, token: SessionToken) -> bool {
        self.token == Some(token)
    }

    fn negotiating(&self) -> bool {
        self.matchmaker.is_chatting() && self.token.is_some()
    }

    fn is_responder_to(&self, from: &PeerId) -> bool {
        self.matchmaker
            .session()
            .is_some_and(|session| session.peer() == from && !session.is_initiator())
    }

    /// An end-of-chat signal naming somebody other than our peer
    fn is_foreign(&self, by: Option<&PeerId>) -> bool {
        match (by, self.matchmaker.session()) {
            (Some(by), Some(session)) if by != session.peer() => {
                tracing::debug!("🚫 Ignoring end of chat sent by {}", by);
                true
            }
            _ => false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> MatchState {
        self.matchmaker.state()
    }

    pub fn session(&self) -> Option<&Session> {
        self.matchmaker.session()
    }

    pub fn local_id(&self) -> Option<&PeerId> {
        self.matchmaker.local_id()
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.token
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.monitor.state()
    }

    pub fn retry_context(&self) -> RetryContext {
        self.monitor.retry_context()
    }

    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.monitor.last_error()
    }

    pub fn has_transport(&self) -> bool {
        self.resources.has_transport()
    }

    pub fn has_media(&self) -> bool {
        self.resources.has_media()
    }

    pub fn backend(&self) -> &B {
        self.resources.backend()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
