use crate::application::EngineInput;
use crate::infrastructure::error::{EngineError, Result};
use crate::infrastructure::media::{
    LocalMedia, MediaBackend, MediaTrack, OfferOptions, PeerTransport, RemoteStream,
    SignalingState, TransportConfig, TransportError, TransportEvent,
};
use crate::infrastructure::message::{IceCandidate, SdpKind, SessionDescription};
use crate::infrastructure::signaling::SignalingChannel;
use pairchat_core::{MediaConstraints, MediaFailure, MediaKinds, PeerId, SessionToken, TrackKind};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// An event the engine emitted on a `MemorySignaling`
#[derive(Debug, Clone, PartialEq)]
pub struct SentSignal {
    pub event: String,
    pub payload: Value,
}

/// In-process signaling channel that records every emitted event
///
/// Clones share the same log, so a test can keep one while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MemorySignaling {
    local_id: Option<PeerId>,
    sent: Rc<RefCell<Vec<SentSignal>>>,
    failing: Rc<Cell<bool>>,
}

impl MemorySignaling {
    pub fn new(local_id: impl Into<PeerId>) -> Self {
        Self {
            local_id: Some(local_id.into()),
            ..Self::default()
        }
    }

    /// Channel that has not been assigned an identity yet
    pub fn unassigned() -> Self {
        Self::default()
    }

    /// Make every following `emit` fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn sent(&self) -> Vec<SentSignal> {
        self.sent.borrow().clone()
    }

    pub fn take_sent(&self) -> Vec<SentSignal> {
        self.sent.borrow_mut().drain(..).collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .map(|signal| signal.event.clone())
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.sent
            .borrow()
            .iter()
            .filter(|signal| signal.event == event)
            .count()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }
}

impl SignalingChannel for MemorySignaling {
    fn local_id(&self) -> Option<PeerId> {
        self.local_id.clone()
    }

    fn emit(&mut self, event: &str, payload: Value) -> Result<()> {
        if self.failing.get() {
            tracing::debug!("📪 Dropping {} on closed channel", event);
            return Err(EngineError::ChannelClosed);
        }
        tracing::trace!("📤 {} {}", event, payload);
        self.sent.borrow_mut().push(SentSignal {
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Work a memory backend has been asked to complete
#[derive(Debug, Clone, PartialEq)]
pub enum BackendTask {
    AcquireMedia {
        token: SessionToken,
        constraints: MediaConstraints,
    },
    CreateDescription {
        token: SessionToken,
        kind: SdpKind,
        options: OfferOptions,
    },
    /// A local candidate gathered after the local description was set
    Gathered {
        token: SessionToken,
        candidate: IceCandidate,
    },
}

impl BackendTask {
    pub fn token(&self) -> SessionToken {
        match self {
            BackendTask::AcquireMedia { token, .. }
            | BackendTask::CreateDescription { token, .. }
            | BackendTask::Gathered { token, .. } => *token,
        }
    }
}

#[derive(Debug, Default)]
struct MediaInner {
    stopped: bool,
    stop_calls: u32,
}

/// Observer for one `MemoryMedia`
#[derive(Debug, Clone)]
pub struct MediaRecord {
    id: String,
    state: Rc<RefCell<MediaInner>>,
}

impl MediaRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_stopped(&self) -> bool {
        self.state.borrow().stopped
    }

    pub fn stop_calls(&self) -> u32 {
        self.state.borrow().stop_calls
    }
}

/// Fake capture handle
#[derive(Debug)]
pub struct MemoryMedia {
    id: String,
    tracks: Vec<MediaTrack>,
    state: Rc<RefCell<MediaInner>>,
}

impl MemoryMedia {
    pub fn new(id: impl Into<String>, kinds: MediaKinds) -> Self {
        let id = id.into();
        let mut tracks = Vec::new();
        if kinds.audio {
            tracks.push(MediaTrack::new(format!("{}-audio", id), TrackKind::Audio));
        }
        if kinds.video {
            tracks.push(MediaTrack::new(format!("{}-video", id), TrackKind::Video));
        }
        Self {
            id,
            tracks,
            state: Rc::new(RefCell::new(MediaInner::default())),
        }
    }

    pub fn record(&self) -> MediaRecord {
        MediaRecord {
            id: self.id.clone(),
            state: self.state.clone(),
        }
    }
}

impl LocalMedia for MemoryMedia {
    fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.clone()
    }

    fn set_enabled(&mut self, kind: TrackKind, enabled: bool) -> bool {
        let mut found = false;
        for track in self.tracks.iter_mut().filter(|t| t.kind == kind) {
            track.enabled = enabled;
            found = true;
        }
        found
    }

    fn stop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.stopped = true;
        state.stop_calls += 1;
    }
}

#[derive(Debug)]
struct TransportInner {
    token: SessionToken,
    config: TransportConfig,
    signaling: SignalingState,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    tracks: Vec<MediaTrack>,
    candidates: Vec<IceCandidate>,
    gathered: u32,
    detached: bool,
    closed: bool,
    close_calls: u32,
    reject_remote: Option<TransportError>,
}

/// Observer for one `MemoryTransport`
#[derive(Debug, Clone)]
pub struct TransportRecord {
    state: Rc<RefCell<TransportInner>>,
}

impl TransportRecord {
    pub fn token(&self) -> SessionToken {
        self.state.borrow().token
    }

    pub fn config(&self) -> TransportConfig {
        self.state.borrow().config.clone()
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.state.borrow().signaling
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.state.borrow().local.clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.state.borrow().remote.clone()
    }

    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.state.borrow().tracks.clone()
    }

    /// Remote candidates applied so far
    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.state.borrow().candidates.clone()
    }

    pub fn is_detached(&self) -> bool {
        self.state.borrow().detached
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn close_calls(&self) -> u32 {
        self.state.borrow().close_calls
    }

    /// Both descriptions are in place and the transport is still live
    pub fn is_negotiated(&self) -> bool {
        let state = self.state.borrow();
        !state.closed
            && state.signaling == SignalingState::Stable
            && state.local.is_some()
            && state.remote.is_some()
    }

    /// Make the next `set_remote_description` fail with `error`
    pub fn reject_next_remote(&self, error: TransportError) {
        self.state.borrow_mut().reject_remote = Some(error);
    }
}

/// Fake peer transport with a faithful offer / answer state machine
#[derive(Debug)]
pub struct MemoryTransport {
    state: Rc<RefCell<TransportInner>>,
    tasks: Rc<RefCell<VecDeque<BackendTask>>>,
}

impl PeerTransport for MemoryTransport {
    fn add_track(&mut self, track: &MediaTrack) -> std::result::Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.tracks.push(track.clone());
        Ok(())
    }

    fn create_local_description(&mut self, kind: SdpKind, options: &OfferOptions) {
        let state = self.state.borrow();
        if state.closed || state.detached {
            return;
        }
        self.tasks.borrow_mut().push_back(BackendTask::CreateDescription {
            token: state.token,
            kind,
            options: *options,
        });
    }

    fn set_local_description(
        &mut self,
        description: &SessionDescription,
    ) -> std::result::Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        let next = match (state.signaling, description.kind) {
            (SignalingState::Stable, SdpKind::Offer) => SignalingState::HaveLocalOffer,
            (SignalingState::HaveRemoteOffer, SdpKind::Answer) => SignalingState::Stable,
            (current, kind) => {
                return Err(TransportError::InvalidState(format!(
                    "cannot set local {} in {:?}",
                    kind, current
                )))
            }
        };
        state.signaling = next;
        state.local = Some(description.clone());
        state.gathered += 1;

        let candidate = IceCandidate::new(
            format!(
                "candidate:{} 1 udp 2122260223 127.0.0.1 {} typ host",
                state.gathered,
                50_000 + state.gathered
            ),
            Some("0".to_string()),
            Some(0),
        );
        self.tasks.borrow_mut().push_back(BackendTask::Gathered {
            token: state.token,
            candidate,
        });
        Ok(())
    }

    fn set_remote_description(
        &mut self,
        description: &SessionDescription,
    ) -> std::result::Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.reject_remote.take() {
            return Err(error);
        }
        let next = match (state.signaling, description.kind) {
            (SignalingState::Stable, SdpKind::Offer) => SignalingState::HaveRemoteOffer,
            (SignalingState::HaveLocalOffer, SdpKind::Answer) => SignalingState::Stable,
            (current, kind) => {
                return Err(TransportError::InvalidState(format!(
                    "cannot set remote {} in {:?}",
                    kind, current
                )))
            }
        };
        state.signaling = next;
        state.remote = Some(description.clone());
        Ok(())
    }

    fn add_ice_candidate(
        &mut self,
        candidate: &IceCandidate,
    ) -> std::result::Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.remote.is_none() {
            return Err(TransportError::InvalidState(
                "no remote description".to_string(),
            ));
        }
        state.candidates.push(candidate.clone());
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        self.state.borrow().signaling
    }

    fn detach(&mut self) {
        self.state.borrow_mut().detached = true;
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.close_calls += 1;
        state.signaling = SignalingState::Closed;
    }
}

#[derive(Debug, Default)]
struct BackendState {
    transports: Vec<TransportRecord>,
    media: Vec<MediaRecord>,
    remote: Option<RemoteStream>,
    media_requests: u32,
    fail_transport: bool,
}

/// In-memory `MediaBackend`
///
/// Requests are queued as `BackendTask`s; `complete` turns one into the
/// engine input a real backend would eventually deliver. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tasks: Rc<RefCell<VecDeque<BackendTask>>>,
    state: Rc<RefCell<BackendState>>,
    label: String,
}

impl MemoryBackend {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    pub fn take_tasks(&self) -> Vec<BackendTask> {
        self.tasks.borrow_mut().drain(..).collect()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Create a capture handle and remember its record
    pub fn make_media(&self, kinds: MediaKinds) -> MemoryMedia {
        let mut state = self.state.borrow_mut();
        let media = MemoryMedia::new(format!("{}-media-{}", self.label, state.media.len()), kinds);
        state.media.push(media.record());
        media
    }

    /// Successful completion of `task`
    pub fn complete(&self, task: BackendTask) -> EngineInput<MemoryMedia> {
        match task {
            BackendTask::AcquireMedia { token, constraints } => EngineInput::MediaResolved {
                token,
                result: Ok(self.make_media(constraints.kinds())),
            },
            BackendTask::CreateDescription { token, kind, .. } => {
                EngineInput::DescriptionCreated {
                    token,
                    result: Ok(SessionDescription::new(
                        kind,
                        format!("v=0\r\no={} {} IN IP4 127.0.0.1\r\n", self.label, token),
                    )),
                }
            }
            BackendTask::Gathered { token, candidate } => EngineInput::Transport {
                token,
                event: TransportEvent::LocalCandidate(candidate),
            },
        }
    }

    /// Failed completion of a media request
    pub fn fail(&self, task: &BackendTask, failure: MediaFailure) -> Option<EngineInput<MemoryMedia>> {
        match task {
            BackendTask::AcquireMedia { token, .. } => Some(EngineInput::MediaResolved {
                token: *token,
                result: Err(failure),
            }),
            _ => None,
        }
    }

    pub fn set_fail_transport_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_transport = fail;
    }

    pub fn transports(&self) -> Vec<TransportRecord> {
        self.state.borrow().transports.clone()
    }

    pub fn last_transport(&self) -> Option<TransportRecord> {
        self.state.borrow().transports.last().cloned()
    }

    pub fn media(&self) -> Vec<MediaRecord> {
        self.state.borrow().media.clone()
    }

    pub fn media_requests(&self) -> u32 {
        self.state.borrow().media_requests
    }

    pub fn remote_stream(&self) -> Option<RemoteStream> {
        self.state.borrow().remote.clone()
    }
}

impl MediaBackend for MemoryBackend {
    type Media = MemoryMedia;
    type Transport = MemoryTransport;

    fn request_local_media(&mut self, token: SessionToken, constraints: &MediaConstraints) {
        self.state.borrow_mut().media_requests += 1;
        self.tasks.borrow_mut().push_back(BackendTask::AcquireMedia {
            token,
            constraints: constraints.clone(),
        });
    }

    fn create_transport(
        &mut self,
        token: SessionToken,
        config: &TransportConfig,
    ) -> std::result::Result<MemoryTransport, TransportError> {
        let mut backend = self.state.borrow_mut();
        if backend.fail_transport {
            return Err(TransportError::OperationFailed(
                "transport creation disabled".to_string(),
            ));
        }

        let state = Rc::new(RefCell::new(TransportInner {
            token,
            config: config.clone(),
            signaling: SignalingState::Stable,
            local: None,
            remote: None,
            tracks: Vec::new(),
            candidates: Vec::new(),
            gathered: 0,
            detached: false,
            closed: false,
            close_calls: 0,
            reject_remote: None,
        }));
        backend.transports.push(TransportRecord {
            state: state.clone(),
        });

        Ok(MemoryTransport {
            state,
            tasks: self.tasks.clone(),
        })
    }

    fn attach_remote_stream(&mut self, stream: &RemoteStream) {
        self.state.borrow_mut().remote = Some(stream.clone());
    }

    fn clear_remote_stream(&mut self) {
        self.state.borrow_mut().remote = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairchat_core::SessionId;

    fn token() -> SessionToken {
        SessionToken::new(SessionId::new(), 1)
    }

    fn transport_config() -> TransportConfig {
        TransportConfig {
            ice_servers: Vec::new(),
            ice_candidate_pool_size: 10,
        }
    }

    #[test]
    fn test_signaling_records_and_fails() {
        let mut channel = MemorySignaling::new("a");
        let seen = channel.clone();

        channel.emit("start-search", Value::Null).unwrap();
        assert_eq!(seen.events(), vec!["start-search"]);

        seen.set_failing(true);
        assert!(channel.emit("stop-search", Value::Null).is_err());
        assert_eq!(seen.count("stop-search"), 0);
    }

    #[test]
    fn test_offer_answer_state_machine() {
        let mut backend = MemoryBackend::new("a");
        let mut offerer = backend.create_transport(token(), &transport_config()).unwrap();
        let mut answerer = backend.create_transport(token(), &transport_config()).unwrap();

        let offer = SessionDescription::new(SdpKind::Offer, "o");
        let answer = SessionDescription::new(SdpKind::Answer, "a");

        offerer.set_local_description(&offer).unwrap();
        assert_eq!(offerer.signaling_state(), SignalingState::HaveLocalOffer);

        answerer.set_remote_description(&offer).unwrap();
        answerer.set_local_description(&answer).unwrap();
        assert_eq!(answerer.signaling_state(), SignalingState::Stable);

        offerer.set_remote_description(&answer).unwrap();
        assert_eq!(offerer.signaling_state(), SignalingState::Stable);

        let duplicate = offerer.set_remote_description(&answer);
        assert!(matches!(duplicate, Err(TransportError::InvalidState(_))));

        assert!(backend.transports().iter().all(|t| t.is_negotiated()));
    }

    #[test]
    fn test_candidate_needs_remote_description() {
        let mut backend = MemoryBackend::new("a");
        let mut transport = backend.create_transport(token(), &transport_config()).unwrap();
        let candidate = IceCandidate::new("candidate:1", None, Some(0));

        assert!(transport.add_ice_candidate(&candidate).is_err());
        transport
            .set_remote_description(&SessionDescription::new(SdpKind::Offer, "o"))
            .unwrap();
        assert!(transport.add_ice_candidate(&candidate).is_ok());
    }

    #[test]
    fn test_media_stop_is_observable() {
        let backend = MemoryBackend::new("a");
        let mut media = backend.make_media(MediaKinds::AUDIO_VIDEO);
        assert_eq!(media.tracks().len(), 2);

        assert!(media.set_enabled(TrackKind::Video, false));
        media.stop();
        media.stop();

        let seen = &backend.media()[0];
        assert!(seen.is_stopped());
        assert_eq!(seen.stop_calls(), 2);
    }

    #[test]
    fn test_complete_media_task() {
        let mut backend = MemoryBackend::new("a");
        let token = token();
        backend.request_local_media(token, &MediaConstraints::voice());

        let tasks = backend.take_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].token(), token);

        match backend.complete(tasks[0].clone()) {
            EngineInput::MediaResolved { token: t, result } => {
                assert_eq!(t, token);
                assert_eq!(result.unwrap().tracks().len(), 1);
            }
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[test]
    fn test_local_description_gathers_candidate() {
        let mut backend = MemoryBackend::new("a");
        let mut transport = backend.create_transport(token(), &transport_config()).unwrap();
        transport
            .set_local_description(&SessionDescription::new(SdpKind::Offer, "o"))
            .unwrap();

        let tasks = backend.take_tasks();
        assert!(matches!(tasks.as_slice(), [BackendTask::Gathered { .. }]));
    }
}
