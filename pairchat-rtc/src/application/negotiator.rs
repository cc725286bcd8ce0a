use crate::application::queue::{CandidateBuffer, SignalQueue};
use crate::infrastructure::media::{OfferOptions, PeerTransport, SignalingState, TransportError};
use crate::infrastructure::message::{IceCandidate, OutboundSignal, SdpKind, SessionDescription};
use pairchat_core::{ConnectionError, PeerId, SessionToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalDescription {
    None,
    Requested(SdpKind),
    Set(SdpKind),
}

/// Offer / answer / ICE exchange for the current generation
///
/// Holds no transport of its own; every call borrows the one owned by the
/// resource lifecycle, which may not exist yet.
#[derive(Debug)]
pub struct SessionNegotiator {
    token: Option<SessionToken>,
    peer: Option<PeerId>,
    initiator: bool,
    options: OfferOptions,
    local: LocalDescription,
    remote_set: bool,
    parked_offer: Option<SessionDescription>,
    /// SDP of the offer handled in this generation, parked or applied
    remote_offer: Option<String>,
    candidates: CandidateBuffer,
}

impl SessionNegotiator {
    pub fn new(ice_buffer_limit: usize) -> Self {
        Self {
            token: None,
            peer: None,
            initiator: false,
            options: OfferOptions::default(),
            local: LocalDescription::None,
            remote_set: false,
            parked_offer: None,
            remote_offer: None,
            candidates: CandidateBuffer::new(ice_buffer_limit),
        }
    }

    /// Start a fresh generation
    pub fn reset(
        &mut self,
        token: SessionToken,
        peer: PeerId,
        initiator: bool,
        options: OfferOptions,
    ) {
        self.clear();
        self.token = Some(token);
        self.peer = Some(peer);
        self.initiator = initiator;
        self.options = options;
    }

    /// Forget everything about the current generation
    pub fn clear(&mut self) {
        self.token = None;
        self.peer = None;
        self.initiator = false;
        self.local = LocalDescription::None;
        self.remote_set = false;
        self.parked_offer = None;
        self.remote_offer = None;
        self.candidates.clear();
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.token
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn buffered_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn has_parked_offer(&self) -> bool {
        self.parked_offer.is_some()
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_set
    }

    /// Our offer for this generation went out
    pub fn offer_sent(&self) -> bool {
        self.local == LocalDescription::Set(SdpKind::Offer)
    }

    pub fn has_remote_offer(&self) -> bool {
        self.remote_offer.is_some()
    }

    /// Same offer as the one this generation already handled
    pub fn is_duplicate_offer(&self, offer: &SessionDescription) -> bool {
        self.remote_offer.as_deref() == Some(offer.sdp.as_str())
    }

    /// The transport for this generation now exists
    pub fn on_transport_ready<T: PeerTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), ConnectionError> {
        if self.initiator {
            self.begin_as_initiator(transport);
            return Ok(());
        }

        if let Some(offer) = self.parked_offer.take() {
            tracing::debug!("📦 Applying offer parked before the transport existed");
            self.apply_offer(&offer, transport)?;
        }
        Ok(())
    }

    /// Request the local offer; at most once per generation
    pub fn begin_as_initiator<T: PeerTransport>(&mut self, transport: &mut T) {
        if !self.initiator || self.local != LocalDescription::None {
            return;
        }
        tracing::info!("📝 Creating offer for {}", self.peer_label());
        transport.create_local_description(SdpKind::Offer, &self.options);
        self.local = LocalDescription::Requested(SdpKind::Offer);
    }

    pub fn on_remote_offer<T: PeerTransport>(
        &mut self,
        offer: SessionDescription,
        from: &PeerId,
        transport: Option<&mut T>,
    ) -> Result<(), ConnectionError> {
        if !self.is_from_peer(from) {
            tracing::debug!("🚫 Ignoring offer from {} (not our peer)", from);
            return Ok(());
        }
        if self.initiator {
            tracing::debug!("🚫 Ignoring offer from {}: we initiate this session", from);
            return Ok(());
        }
        if self.local != LocalDescription::None || self.remote_set || self.parked_offer.is_some()
        {
            tracing::debug!("🔁 Ignoring duplicate offer from {}", from);
            return Ok(());
        }

        self.remote_offer = Some(offer.sdp.clone());
        match transport {
            Some(transport) => self.apply_offer(&offer, transport),
            None => {
                tracing::debug!("📦 Parking offer from {} until the transport exists", from);
                self.parked_offer = Some(offer);
                Ok(())
            }
        }
    }

    fn apply_offer<T: PeerTransport>(
        &mut self,
        offer: &SessionDescription,
        transport: &mut T,
    ) -> Result<(), ConnectionError> {
        transport.set_remote_description(offer).map_err(|e| {
            ConnectionError::negotiation("Failed to handle the incoming call.")
                .with_detail(e.to_string())
        })?;
        self.remote_set = true;
        self.flush_candidates(transport);

        tracing::info!("📝 Creating answer for {}", self.peer_label());
        transport.create_local_description(SdpKind::Answer, &self.options);
        self.local = LocalDescription::Requested(SdpKind::Answer);
        Ok(())
    }

    /// A description requested from the transport is ready
    pub fn on_description_created<T: PeerTransport>(
        &mut self,
        result: Result<SessionDescription, TransportError>,
        transport: Option<&mut T>,
        outbox: &mut SignalQueue,
    ) -> Result<(), ConnectionError> {
        let LocalDescription::Requested(expected) = self.local else {
            tracing::debug!("🚫 Ignoring description nobody asked for");
            return Ok(());
        };
        let Some(transport) = transport else {
            return Ok(());
        };

        let description = result.map_err(|e| {
            ConnectionError::negotiation(format!("Failed to create {}.", expected))
                .with_detail(e.to_string())
        })?;
        if description.kind != expected {
            tracing::warn!(
                "⚠️ Transport produced {} while {} was requested",
                description.kind,
                expected
            );
            return Ok(());
        }

        transport.set_local_description(&description).map_err(|e| {
            ConnectionError::negotiation(format!("Failed to apply local {}.", expected))
                .with_detail(e.to_string())
        })?;
        self.local = LocalDescription::Set(expected);

        let Some(to) = self.peer.clone() else {
            return Ok(());
        };
        let signal = match expected {
            SdpKind::Offer => OutboundSignal::Offer {
                to,
                offer: description,
            },
            _ => OutboundSignal::Answer {
                to,
                answer: description,
            },
        };
        tracing::info!("📤 Sending {} to {}", expected, self.peer_label());
        outbox.push(signal).map_err(|e| {
            ConnectionError::signaling("Failed to send the call setup.").with_detail(e.to_string())
        })
    }

    pub fn on_remote_answer<T: PeerTransport>(
        &mut self,
        answer: SessionDescription,
        from: &PeerId,
        transport: Option<&mut T>,
    ) -> Result<(), ConnectionError> {
        if !self.is_from_peer(from) {
            tracing::debug!("🚫 Ignoring answer from {} (not our peer)", from);
            return Ok(());
        }
        let Some(transport) = transport else {
            tracing::debug!("🚫 Ignoring answer from {}: no transport", from);
            return Ok(());
        };

        match transport.signaling_state() {
            SignalingState::HaveLocalOffer => {}
            SignalingState::Stable => {
                tracing::debug!("🔁 Ignoring stale answer from {}", from);
                return Ok(());
            }
            state => {
                tracing::debug!("🚫 Ignoring answer from {} in {:?}", from, state);
                return Ok(());
            }
        }

        match transport.set_remote_description(&answer) {
            Ok(()) => {
                tracing::info!("✅ Answer from {} applied", from);
                self.remote_set = true;
                self.flush_candidates(transport);
                Ok(())
            }
            Err(TransportError::InvalidState(reason)) => {
                tracing::debug!("🔁 Answer from {} raced: {}", from, reason);
                Ok(())
            }
            Err(e) => Err(
                ConnectionError::negotiation("Failed to complete the call setup.")
                    .with_detail(e.to_string()),
            ),
        }
    }

    /// Apply a remote candidate now, or buffer it until it can be applied
    pub fn on_remote_candidate<T: PeerTransport>(
        &mut self,
        candidate: IceCandidate,
        from: &PeerId,
        transport: Option<&mut T>,
    ) {
        if !self.is_from_peer(from) {
            tracing::debug!("🚫 Ignoring candidate from {} (not our peer)", from);
            return;
        }
        if candidate.is_end_of_candidates() {
            return;
        }

        match transport {
            Some(transport) if self.remote_set => Self::apply_candidate(transport, &candidate),
            _ => {
                if let Some(evicted) = self.candidates.push(candidate) {
                    tracing::debug!(
                        "🗑️ Candidate buffer full, dropped {}",
                        evicted.candidate
                    );
                }
            }
        }
    }

    /// Forward a locally gathered candidate to the peer
    pub fn on_local_candidate(
        &self,
        candidate: IceCandidate,
        outbox: &mut SignalQueue,
    ) -> Result<(), ConnectionError> {
        if candidate.is_end_of_candidates() {
            return Ok(());
        }
        let Some(to) = self.peer.clone() else {
            return Ok(());
        };
        outbox
            .push(OutboundSignal::IceCandidate { to, candidate })
            .map_err(|e| {
                ConnectionError::signaling("Failed to send connection candidates.")
                    .with_detail(e.to_string())
            })
    }

    fn flush_candidates<T: PeerTransport>(&mut self, transport: &mut T) {
        let dropped = self.candidates.dropped();
        let buffered = self.candidates.drain();
        if !buffered.is_empty() {
            tracing::debug!(
                "📦 Applying {} buffered candidates ({} dropped)",
                buffered.len(),
                dropped
            );
        }
        for candidate in buffered {
            Self::apply_candidate(transport, &candidate);
        }
    }

    fn apply_candidate<T: PeerTransport>(transport: &mut T, candidate: &IceCandidate) {
        if let Err(e) = transport.add_ice_candidate(candidate) {
            let error = ConnectionError::ice("Failed to add ICE candidate").with_detail(e.to_string());
            tracing::warn!("⚠️ {} ({:?})", error, error.detail);
        }
    }

    fn is_from_peer(&self, from: &PeerId) -> bool {
        self.peer.as_ref() == Some(from)
    }

    fn peer_label(&self) -> String {
        self.peer
            .as_ref()
            .map(|peer| peer.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::media::{MediaBackend, TransportConfig};
    use crate::infrastructure::memory::{BackendTask, MemoryBackend, MemoryTransport};
    use pairchat_core::{MediaKinds, SessionId};

    struct Setup {
        negotiator: SessionNegotiator,
        backend: MemoryBackend,
        transport: MemoryTransport,
        outbox: SignalQueue,
        token: SessionToken,
    }

    fn setup(initiator: bool) -> Setup {
        let mut backend = MemoryBackend::new("test");
        let token = SessionToken::new(SessionId::new(), 1);
        let transport = backend
            .create_transport(
                token,
                &TransportConfig {
                    ice_servers: Vec::new(),
                    ice_candidate_pool_size: 10,
                },
            )
            .unwrap();

        let mut negotiator = SessionNegotiator::new(4);
        negotiator.reset(
            token,
            "peer".into(),
            initiator,
            OfferOptions::from(MediaKinds::AUDIO_ONLY),
        );

        Setup {
            negotiator,
            backend,
            transport,
            outbox: SignalQueue::default(),
            token,
        }
    }

    fn created(kind: SdpKind) -> Result<SessionDescription, TransportError> {
        Ok(SessionDescription::new(kind, format!("{}-sdp", kind)))
    }

    fn description_requests(backend: &MemoryBackend) -> Vec<SdpKind> {
        backend
            .take_tasks()
            .into_iter()
            .filter_map(|task| match task {
                BackendTask::CreateDescription { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_initiator_sends_one_offer() {
        let mut s = setup(true);

        s.negotiator.on_transport_ready(&mut s.transport).unwrap();
        s.negotiator.begin_as_initiator(&mut s.transport);
        assert_eq!(description_requests(&s.backend), vec![SdpKind::Offer]);

        s.negotiator
            .on_description_created(created(SdpKind::Offer), Some(&mut s.transport), &mut s.outbox)
            .unwrap();
        s.negotiator
            .on_description_created(created(SdpKind::Offer), Some(&mut s.transport), &mut s.outbox)
            .unwrap();

        let sent = s.outbox.drain();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], OutboundSignal::Offer { to, .. } if to.as_str() == "peer"));
        assert_eq!(s.transport.signaling_state(), SignalingState::HaveLocalOffer);
    }

    #[test]
    fn test_offer_creation_failure_is_negotiation_error() {
        let mut s = setup(true);
        s.negotiator.on_transport_ready(&mut s.transport).unwrap();

        let error = s
            .negotiator
            .on_description_created(
                Err(TransportError::OperationFailed("boom".to_string())),
                Some(&mut s.transport),
                &mut s.outbox,
            )
            .unwrap_err();
        assert_eq!(error.kind, pairchat_core::ErrorKind::Negotiation);
        assert!(error.retryable);
        assert!(s.outbox.is_empty());
    }

    #[test]
    fn test_responder_answers_offer() {
        let mut s = setup(false);
        s.negotiator.on_transport_ready(&mut s.transport).unwrap();
        assert!(description_requests(&s.backend).is_empty());

        s.negotiator
            .on_remote_offer(
                SessionDescription::new(SdpKind::Offer, "o"),
                &"peer".into(),
                Some(&mut s.transport),
            )
            .unwrap();
        assert_eq!(description_requests(&s.backend), vec![SdpKind::Answer]);

        s.negotiator
            .on_description_created(created(SdpKind::Answer), Some(&mut s.transport), &mut s.outbox)
            .unwrap();
        let sent = s.outbox.drain();
        assert!(matches!(sent.as_slice(), [OutboundSignal::Answer { .. }]));
        assert_eq!(s.transport.signaling_state(), SignalingState::Stable);
    }

    #[test]
    fn test_offer_before_transport_is_parked() {
        let mut s = setup(false);

        s.negotiator
            .on_remote_offer::<MemoryTransport>(
                SessionDescription::new(SdpKind::Offer, "o"),
                &"peer".into(),
                None,
            )
            .unwrap();
        assert!(s.negotiator.has_parked_offer());

        s.negotiator.on_transport_ready(&mut s.transport).unwrap();
        assert!(!s.negotiator.has_parked_offer());
        assert_eq!(description_requests(&s.backend), vec![SdpKind::Answer]);
    }

    #[test]
    fn test_duplicate_offer_ignored() {
        let mut s = setup(false);
        let offer = SessionDescription::new(SdpKind::Offer, "o");

        s.negotiator
            .on_remote_offer(offer.clone(), &"peer".into(), Some(&mut s.transport))
            .unwrap();
        s.negotiator
            .on_remote_offer(offer, &"peer".into(), Some(&mut s.transport))
            .unwrap();

        assert_eq!(description_requests(&s.backend), vec![SdpKind::Answer]);
    }

    #[test]
    fn test_remembers_handled_offer() {
        let mut s = setup(false);
        let offer = SessionDescription::new(SdpKind::Offer, "o-1");
        assert!(!s.negotiator.has_remote_offer());

        s.negotiator
            .on_remote_offer::<MemoryTransport>(offer.clone(), &"peer".into(), None)
            .unwrap();

        assert!(s.negotiator.has_remote_offer());
        assert!(s.negotiator.is_duplicate_offer(&offer));
        assert!(!s
            .negotiator
            .is_duplicate_offer(&SessionDescription::new(SdpKind::Offer, "o-2")));

        s.negotiator.clear();
        assert!(!s.negotiator.has_remote_offer());
    }

    #[test]
    fn test_offer_sent_only_once_set_locally() {
        let mut s = setup(true);
        s.negotiator.on_transport_ready(&mut s.transport).unwrap();
        assert!(!s.negotiator.offer_sent());

        s.negotiator
            .on_description_created(created(SdpKind::Offer), Some(&mut s.transport), &mut s.outbox)
            .unwrap();
        assert!(s.negotiator.offer_sent());
    }

    #[test]
    fn test_offers_from_strangers_ignored() {
        let mut s = setup(false);
        s.negotiator
            .on_remote_offer(
                SessionDescription::new(SdpKind::Offer, "o"),
                &"mallory".into(),
                Some(&mut s.transport),
            )
            .unwrap();
        assert!(!s.negotiator.has_remote_description());
    }

    #[test]
    fn test_initiator_ignores_offers() {
        let mut s = setup(true);
        s.negotiator
            .on_remote_offer(
                SessionDescription::new(SdpKind::Offer, "o"),
                &"peer".into(),
                Some(&mut s.transport),
            )
            .unwrap();
        assert_eq!(s.transport.signaling_state(), SignalingState::Stable);
    }

    #[test]
    fn test_stale_answer_while_stable_ignored() {
        let mut s = setup(true);
        let result = s.negotiator.on_remote_answer(
            SessionDescription::new(SdpKind::Answer, "a"),
            &"peer".into(),
            Some(&mut s.transport),
        );
        assert!(result.is_ok());
        assert!(!s.negotiator.has_remote_description());
    }

    #[test]
    fn test_answer_applied_in_have_local_offer() {
        let mut s = setup(true);
        s.negotiator.on_transport_ready(&mut s.transport).unwrap();
        s.negotiator
            .on_description_created(created(SdpKind::Offer), Some(&mut s.transport), &mut s.outbox)
            .unwrap();

        s.negotiator
            .on_remote_answer(
                SessionDescription::new(SdpKind::Answer, "a"),
                &"peer".into(),
                Some(&mut s.transport),
            )
            .unwrap();
        assert!(s.negotiator.has_remote_description());
        assert_eq!(s.transport.signaling_state(), SignalingState::Stable);
    }

    #[test]
    fn test_answer_failure_is_negotiation_error() {
        let mut s = setup(true);
        s.negotiator.on_transport_ready(&mut s.transport).unwrap();
        s.negotiator
            .on_description_created(created(SdpKind::Offer), Some(&mut s.transport), &mut s.outbox)
            .unwrap();

        let seen = s.backend.last_transport().unwrap();
        seen.reject_next_remote(TransportError::OperationFailed("bad sdp".to_string()));

        let error = s
            .negotiator
            .on_remote_answer(
                SessionDescription::new(SdpKind::Answer, "a"),
                &"peer".into(),
                Some(&mut s.transport),
            )
            .unwrap_err();
        assert_eq!(error.kind, pairchat_core::ErrorKind::Negotiation);
    }

    #[test]
    fn test_answer_invalid_state_is_swallowed() {
        let mut s = setup(true);
        s.negotiator.on_transport_ready(&mut s.transport).unwrap();
        s.negotiator
            .on_description_created(created(SdpKind::Offer), Some(&mut s.transport), &mut s.outbox)
            .unwrap();

        let seen = s.backend.last_transport().unwrap();
        seen.reject_next_remote(TransportError::InvalidState("raced".to_string()));

        let result = s.negotiator.on_remote_answer(
            SessionDescription::new(SdpKind::Answer, "a"),
            &"peer".into(),
            Some(&mut s.transport),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_candidates_buffered_until_remote_description() {
        let mut s = setup(false);
        for n in 0..3 {
            s.negotiator.on_remote_candidate(
                IceCandidate::new(format!("candidate:{}", n), None, Some(0)),
                &"peer".into(),
                Some(&mut s.transport),
            );
        }
        assert_eq!(s.negotiator.buffered_candidates(), 3);

        s.negotiator
            .on_remote_offer(
                SessionDescription::new(SdpKind::Offer, "o"),
                &"peer".into(),
                Some(&mut s.transport),
            )
            .unwrap();

        assert_eq!(s.negotiator.buffered_candidates(), 0);
        let seen = s.backend.last_transport().unwrap();
        assert_eq!(seen.candidates().len(), 3);
        assert_eq!(seen.candidates()[0].candidate, "candidate:0");
    }

    #[test]
    fn test_candidate_buffer_is_bounded() {
        let mut s = setup(false);
        for n in 0..10 {
            s.negotiator.on_remote_candidate::<MemoryTransport>(
                IceCandidate::new(format!("candidate:{}", n), None, Some(0)),
                &"peer".into(),
                None,
            );
        }
        assert_eq!(s.negotiator.buffered_candidates(), 4);
    }

    #[test]
    fn test_local_candidates_go_to_peer_only() {
        let s = setup(true);
        let mut outbox = SignalQueue::default();

        s.negotiator
            .on_local_candidate(IceCandidate::new("candidate:1", None, Some(0)), &mut outbox)
            .unwrap();
        s.negotiator
            .on_local_candidate(IceCandidate::new("", None, None), &mut outbox)
            .unwrap();

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert!(
            matches!(&sent[0], OutboundSignal::IceCandidate { to, .. } if to.as_str() == "peer")
        );
        assert_eq!(s.token, s.negotiator.token().unwrap());
    }

    #[test]
    fn test_clear_forgets_generation() {
        let mut s = setup(false);
        s.negotiator.on_remote_candidate::<MemoryTransport>(
            IceCandidate::new("candidate:1", None, Some(0)),
            &"peer".into(),
            None,
        );
        s.negotiator.clear();

        assert_eq!(s.negotiator.token(), None);
        assert_eq!(s.negotiator.buffered_candidates(), 0);
    }
}
