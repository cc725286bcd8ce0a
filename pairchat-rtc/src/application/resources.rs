use crate::infrastructure::media::{
    LocalMedia, MediaBackend, PeerTransport, RemoteStream, TransportConfig,
};
use pairchat_core::{ConnectionError, MediaConstraints, SessionToken, TrackKind};

/// Outcome of handing resolved media to the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// Media installed and transport created
    Installed,
    /// Token no longer current; the media was stopped
    Stale,
}

/// Sole owner of the local media source and the peer transport
pub struct ResourceLifecycle<B: MediaBackend> {
    backend: B,
    media: Option<B::Media>,
    transport: Option<B::Transport>,
    /// Acquisition the lifecycle is waiting on
    expected: Option<SessionToken>,
    remote_attached: bool,
}

impl<B: MediaBackend> ResourceLifecycle<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            media: None,
            transport: None,
            expected: None,
            remote_attached: false,
        }
    }

    /// Ask the backend for local media on behalf of `token`
    pub fn acquire(&mut self, token: SessionToken, constraints: &MediaConstraints) {
        tracing::debug!("🎙️ Requesting local media for {}", token);
        self.expected = Some(token);
        self.backend.request_local_media(token, constraints);
    }

    /// Install resolved media: create the transport and add every local track
    pub fn attach(
        &mut self,
        token: SessionToken,
        mut media: B::Media,
        config: &TransportConfig,
    ) -> Result<Attach, ConnectionError> {
        if self.expected != Some(token) || self.media.is_some() {
            tracing::debug!("🗑️ Stopping media resolved for stale token {}", token);
            media.stop();
            return Ok(Attach::Stale);
        }
        self.expected = None;

        let mut transport = match self.backend.create_transport(token, config) {
            Ok(transport) => transport,
            Err(e) => {
                media.stop();
                return Err(ConnectionError::negotiation("Failed to create peer connection.")
                    .with_detail(e.to_string()));
            }
        };

        for track in media.tracks() {
            if let Err(e) = transport.add_track(&track) {
                transport.detach();
                transport.close();
                media.stop();
                return Err(
                    ConnectionError::negotiation("Failed to add local media to the connection.")
                        .with_detail(e.to_string()),
                );
            }
        }

        tracing::info!(
            "🔌 Transport ready for {} ({} ICE servers, {} tracks)",
            token,
            config.ice_servers.len(),
            media.tracks().len()
        );
        self.media = Some(media);
        self.transport = Some(transport);
        Ok(Attach::Installed)
    }

    pub fn attach_remote(&mut self, stream: &RemoteStream) {
        self.backend.attach_remote_stream(stream);
        self.remote_attached = true;
    }

    /// Release everything; safe to call any number of times
    ///
    /// Returns whether anything was actually released.
    pub fn teardown(&mut self) -> bool {
        let mut released = self.expected.take().is_some();

        if let Some(mut transport) = self.transport.take() {
            transport.detach();
            transport.close();
            released = true;
        }

        if let Some(mut media) = self.media.take() {
            media.stop();
            released = true;
        }

        if self.remote_attached {
            self.backend.clear_remote_stream();
            self.remote_attached = false;
            released = true;
        }

        if released {
            tracing::debug!("🧹 Resources released");
        }
        released
    }

    /// Enable or disable local tracks of one kind; false when there are none
    pub fn set_track_enabled(&mut self, kind: TrackKind, enabled: bool) -> bool {
        self.media
            .as_mut()
            .map(|media| media.set_enabled(kind, enabled))
            .unwrap_or(false)
    }

    pub fn transport_mut(&mut self) -> Option<&mut B::Transport> {
        self.transport.as_mut()
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    pub fn is_acquiring(&self) -> bool {
        self.expected.is_some()
    }

    pub fn has_remote_stream(&self) -> bool {
        self.remote_attached
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
