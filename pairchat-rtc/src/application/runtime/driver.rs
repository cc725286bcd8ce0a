use crate::application::engine::{EngineInput, EngineNotice, SessionEngine, UserIntent};
use crate::infrastructure::error::{EngineError, Result};
use crate::infrastructure::media::MediaBackend;
use crate::infrastructure::signaling::SignalingChannel;
use serde_json::Value;
use tokio::sync::mpsc;

fn now() -> instant::Instant {
    tokio::time::Instant::now().into_std()
}

/// Posts inputs to a running `EngineRuntime`
///
/// Adapters keep a clone and send their completions through it.
pub struct EngineHandle<M> {
    tx: mpsc::UnboundedSender<EngineInput<M>>,
}

impl<M> Clone for EngineHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> EngineHandle<M> {
    pub fn send(&self, input: EngineInput<M>) -> Result<()> {
        self.tx.send(input).map_err(|_| EngineError::RuntimeStopped)
    }

    pub fn intent(&self, intent: UserIntent) -> Result<()> {
        self.send(EngineInput::Intent(intent))
    }

    /// Forward a raw event received from the signaling server
    pub fn signal(&self, event: impl Into<String>, payload: Value) -> Result<()> {
        self.send(EngineInput::signal(event, payload))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drives a `SessionEngine` on tokio
///
/// Inputs arrive over an unbounded queue; between inputs the runtime sleeps
/// until the engine's next deadline. `run` returns the engine once every
/// handle has been dropped.
pub struct EngineRuntime<C: SignalingChannel, B: MediaBackend> {
    engine: SessionEngine<C, B>,
    rx: mpsc::UnboundedReceiver<EngineInput<B::Media>>,
    notices: Option<mpsc::UnboundedSender<EngineNotice>>,
}

impl<C: SignalingChannel, B: MediaBackend> EngineRuntime<C, B> {
    pub fn new(engine: SessionEngine<C, B>) -> (Self, EngineHandle<B::Media>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = Self {
            engine,
            rx,
            notices: None,
        };
        (runtime, EngineHandle { tx })
    }

    /// Receive every notice the engine produces from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<EngineNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notices = Some(tx);
        rx
    }

    pub fn engine(&self) -> &SessionEngine<C, B> {
        &self.engine
    }

    pub async fn run(mut self) -> SessionEngine<C, B> {
        tracing::info!("▶️ Engine runtime started");

        loop {
            let deadline = self
                .engine
                .poll_timeout()
                .map(tokio::time::Instant::from_std);

            tokio::select! {
                input = self.rx.recv() => match input {
                    Some(input) => self.engine.handle(input, now()),
                    None => break,
                },
                _ = async {
                    match deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.engine.handle_timeout(now());
                }
            }

            self.forward_notices();
        }

        tracing::info!("⏹️ Engine runtime stopped (all handles dropped)");
        self.engine
    }

    /// Handle everything already queued plus any deadline that has passed
    ///
    /// Returns the number of inputs processed.
    pub fn run_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(input) = self.rx.try_recv() {
            self.engine.handle(input, now());
            processed += 1;
        }
        if self.engine.poll_timeout().is_some_and(|at| at <= now()) {
            self.engine.handle_timeout(now());
        }
        self.forward_notices();
        processed
    }

    fn forward_notices(&mut self) {
        let Some(tx) = &self.notices else {
            return;
        };
        for notice in self.engine.drain_notices() {
            if tx.send(notice).is_err() {
                tracing::debug!("🔕 Notice subscriber gone");
                self.notices = None;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::media::{TransportEvent, TransportState};
    use crate::infrastructure::memory::{BackendTask, MemoryBackend, MemoryMedia, MemorySignaling};
    use instant::Duration;
    use pairchat_core::{EngineConfig, MatchState, Phase};
    use serde_json::json;

    fn runtime() -> (
        EngineRuntime<MemorySignaling, MemoryBackend>,
        EngineHandle<MemoryMedia>,
        MemorySignaling,
        MemoryBackend,
    ) {
        let channel = MemorySignaling::new("a");
        let backend = MemoryBackend::new("a");
        let engine =
            SessionEngine::new(EngineConfig::voice(), channel.clone(), backend.clone()).unwrap();
        let (runtime, handle) = EngineRuntime::new(engine);
        (runtime, handle, channel, backend)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_engine_when_handles_dropped() {
        let (runtime, handle, channel, _) = runtime();

        let driver = async move {
            handle.intent(UserIntent::StartSearch).unwrap();
            settle().await;
            assert_eq!(channel.events(), vec!["start-search"]);
        };

        let (engine, ()) = tokio::join!(runtime.run(), driver);
        assert_eq!(engine.state(), MatchState::Searching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_timer_fires_on_virtual_clock() {
        let (mut runtime, handle, _, backend) = runtime();
        let mut notices = runtime.subscribe();

        let driver = async move {
            handle.intent(UserIntent::StartSearch).unwrap();
            handle
                .signal("match-found", json!({ "peerId": "b" }))
                .unwrap();
            handle.intent(UserIntent::Accept).unwrap();
            handle.signal("chat-start", json!({ "peerId": "b" })).unwrap();
            settle().await;

            for task in backend.take_tasks() {
                if matches!(task, BackendTask::AcquireMedia { .. }) {
                    handle.send(backend.complete(task)).unwrap();
                }
            }
            settle().await;

            let token = backend.last_transport().unwrap().token();
            handle
                .send(EngineInput::Transport {
                    token,
                    event: TransportEvent::StateChanged(TransportState::Failed),
                })
                .unwrap();
            settle().await;
            assert_eq!(backend.media_requests(), 1);

            tokio::time::sleep(Duration::from_millis(2_100)).await;
            assert_eq!(backend.media_requests(), 2);
        };

        let (engine, ()) = tokio::join!(runtime.run(), driver);
        assert_eq!(engine.retry_context().attempt, 1);
        assert_eq!(engine.phase(), &Phase::Connecting);

        let mut saw_retrying = false;
        while let Ok(notice) = notices.try_recv() {
            if matches!(notice, EngineNotice::PhaseChanged(Phase::Retrying { .. })) {
                saw_retrying = true;
            }
        }
        assert!(saw_retrying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_on_virtual_clock() {
        let (mut runtime, handle, _, _) = runtime();

        handle.intent(UserIntent::StartSearch).unwrap();
        handle.signal("match-found", json!({ "peerId": "b" })).unwrap();
        handle.signal("chat-start", json!({ "peerId": "b" })).unwrap();
        assert_eq!(runtime.run_pending(), 3);
        assert_eq!(runtime.engine().state(), MatchState::Chatting);

        tokio::time::advance(Duration::from_secs(30)).await;
        runtime.run_pending();

        assert_eq!(runtime.engine().retry_context().attempt, 1);
        assert!(matches!(runtime.engine().phase(), Phase::Retrying { .. }));
    }

    #[test]
    fn test_handle_reports_stopped_runtime() {
        let (runtime, handle, _, _) = runtime();
        drop(runtime);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.intent(UserIntent::StartSearch),
            Err(EngineError::RuntimeStopped)
        ));
    }
}
