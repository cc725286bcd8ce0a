use crate::infrastructure::media::TransportState;
use instant::{Duration, Instant};
use pairchat_core::{ConnectionError, ConnectionState, ErrorKind, RetryContext, RetryPolicy};

/// What the monitor decided about a reported failure
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Swallowed: ICE noise, a retry already pending, or already failed
    Ignored,
    /// A retry timer was armed
    Retry { attempt: u32, delay: Duration },
    /// No automatic recovery; resources must be released
    Terminal(ConnectionError),
}

/// Deadline that fired in `handle_timeout`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorTimer {
    ConnectTimeout,
    Retry,
}

/// Supervises connectivity of the live session and decides on recovery
#[derive(Debug)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    policy: RetryPolicy,
    retry: RetryContext,
    connect_timeout: Duration,
    connect_deadline: Option<Instant>,
    retry_at: Option<Instant>,
    last_error: Option<ConnectionError>,
}

impl ConnectionMonitor {
    pub fn new(policy: RetryPolicy, connect_timeout: Duration) -> Self {
        let retry = RetryContext::new(policy.max_attempts());
        Self {
            state: ConnectionState::Disconnected,
            policy,
            retry,
            connect_timeout,
            connect_deadline: None,
            retry_at: None,
            last_error: None,
        }
    }

    /// Forget everything about the previous session
    pub fn reset_for_session(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.retry.reset();
        self.connect_deadline = None;
        self.retry_at = None;
        self.last_error = None;
    }

    /// A fresh attempt starts now: arm the establishment timeout
    pub fn begin_attempt(&mut self, now: Instant) {
        self.state = ConnectionState::Connecting;
        self.connect_deadline = Some(now + self.connect_timeout);
        self.retry_at = None;
        self.last_error = None;
    }

    /// Track a transport state change
    ///
    /// Returns the error to report when the transport went down.
    pub fn on_transport_state(
        &mut self,
        state: TransportState,
        _now: Instant,
    ) -> Option<ConnectionError> {
        match state {
            TransportState::Connected => {
                if self.retry_at.is_some() {
                    tracing::info!("✅ Connection recovered, cancelling pending retry");
                }
                self.state = ConnectionState::Connected;
                self.retry.reset();
                self.connect_deadline = None;
                self.retry_at = None;
                self.last_error = None;
                None
            }
            TransportState::Connecting => {
                if self.state != ConnectionState::Failed {
                    self.state = ConnectionState::Connecting;
                }
                None
            }
            TransportState::New => None,
            down => {
                tracing::debug!("📉 Transport went {}", down);
                Some(ConnectionError::connection_lost().with_detail(down.to_string()))
            }
        }
    }

    /// Classify a failure and decide between retrying and giving up
    pub fn report(&mut self, error: ConnectionError, now: Instant) -> Verdict {
        if error.kind == ErrorKind::Ice {
            tracing::warn!("⚠️ {}", error);
            return Verdict::Ignored;
        }
        if self.retry_at.is_some() {
            tracing::debug!("⏳ Retry already pending, ignoring: {}", error);
            return Verdict::Ignored;
        }
        if self.state == ConnectionState::Failed {
            tracing::debug!("🚫 Already failed, ignoring: {}", error);
            return Verdict::Ignored;
        }

        tracing::warn!("❌ {} (detail: {:?})", error, error.detail);
        self.state = ConnectionState::Failed;
        self.connect_deadline = None;
        self.last_error = Some(error.clone());

        if !error.retryable {
            return Verdict::Terminal(error);
        }

        match self.retry.schedule(&self.policy) {
            Some(delay) => {
                self.retry_at = Some(now + delay);
                tracing::info!(
                    "🔄 Retry {}/{} in {}ms",
                    self.retry.attempt,
                    self.retry.max_attempts,
                    delay.as_millis()
                );
                Verdict::Retry {
                    attempt: self.retry.attempt,
                    delay,
                }
            }
            None => {
                tracing::warn!(
                    "🛑 Giving up after {} attempts",
                    self.retry.max_attempts
                );
                Verdict::Terminal(error)
            }
        }
    }

    /// Earliest deadline the caller must wake up for
    pub fn poll_timeout(&self) -> Option<Instant> {
        match (self.connect_deadline, self.retry_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire whichever deadline has passed, at most one per call
    pub fn handle_timeout(&mut self, now: Instant) -> Option<MonitorTimer> {
        if self.retry_at.is_some_and(|at| at <= now) {
            self.retry_at = None;
            return Some(MonitorTimer::Retry);
        }
        if self.connect_deadline.is_some_and(|at| at <= now) {
            self.connect_deadline = None;
            return Some(MonitorTimer::ConnectTimeout);
        }
        None
    }

    /// Manual retry: the automatic budget starts over
    pub fn retry_now(&mut self) {
        self.retry.reset();
        self.retry_at = None;
        self.last_error = None;
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_at.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_context(&self) -> RetryContext {
        self.retry
    }

    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.state == ConnectionState::Failed && self.retry_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairchat_core::{MediaFailure, MediaKinds};

    fn monitor() -> ConnectionMonitor {
        ConnectionMonitor::new(RetryPolicy::default(), Duration::from_secs(30))
    }

    #[test]
    fn test_first_failure_schedules_two_seconds() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);

        let error = monitor.on_transport_state(TransportState::Failed, now).unwrap();
        let verdict = monitor.report(error, now);

        assert_eq!(
            verdict,
            Verdict::Retry {
                attempt: 1,
                delay: Duration::from_millis(2000)
            }
        );
        assert_eq!(monitor.retry_context().scheduled_delay_ms, 2000);
        assert_eq!(monitor.poll_timeout(), Some(now + Duration::from_millis(2000)));
    }

    #[test]
    fn test_one_failure_one_retry() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);

        monitor.report(ConnectionError::connection_lost(), now);
        let second = monitor.report(ConnectionError::negotiation("again"), now);

        assert_eq!(second, Verdict::Ignored);
        assert_eq!(monitor.retry_context().attempt, 1);
    }

    #[test]
    fn test_exhaustion_is_terminal() {
        let mut monitor = monitor();
        let mut now = Instant::now();

        for expected in 1..=3 {
            monitor.begin_attempt(now);
            let verdict = monitor.report(ConnectionError::connection_lost(), now);
            assert!(matches!(verdict, Verdict::Retry { attempt, .. } if attempt == expected));

            now = monitor.poll_timeout().unwrap();
            assert_eq!(monitor.handle_timeout(now), Some(MonitorTimer::Retry));
        }

        monitor.begin_attempt(now);
        let verdict = monitor.report(ConnectionError::connection_lost(), now);
        assert!(matches!(verdict, Verdict::Terminal(_)));
        assert!(!monitor.retry_pending());
        assert!(monitor.is_failed());
        assert_eq!(monitor.retry_context().attempt, 3);
    }

    #[test]
    fn test_non_retryable_is_terminal_immediately() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);

        let error = MediaFailure::PermissionDenied.into_error(MediaKinds::AUDIO_ONLY);
        assert!(matches!(monitor.report(error, now), Verdict::Terminal(_)));
        assert_eq!(monitor.retry_context().attempt, 0);
        assert_eq!(monitor.poll_timeout(), None);
    }

    #[test]
    fn test_ice_errors_ignored() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);

        let verdict = monitor.report(ConnectionError::ice("bad candidate"), now);
        assert_eq!(verdict, Verdict::Ignored);
        assert_eq!(monitor.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_connected_cancels_retry_and_resets() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);
        monitor.report(ConnectionError::connection_lost(), now);
        assert!(monitor.retry_pending());

        assert!(monitor
            .on_transport_state(TransportState::Connected, now)
            .is_none());
        assert!(!monitor.retry_pending());
        assert_eq!(monitor.retry_context().attempt, 0);
        assert_eq!(monitor.last_error(), None);
        assert_eq!(monitor.poll_timeout(), None);
    }

    #[test]
    fn test_connect_timeout_fires() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);

        assert_eq!(monitor.handle_timeout(now + Duration::from_secs(29)), None);
        assert_eq!(
            monitor.handle_timeout(now + Duration::from_secs(30)),
            Some(MonitorTimer::ConnectTimeout)
        );
        assert_eq!(monitor.handle_timeout(now + Duration::from_secs(31)), None);
    }

    #[test]
    fn test_retry_now_resets_attempts() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);
        monitor.report(ConnectionError::connection_lost(), now);

        monitor.retry_now();
        assert_eq!(monitor.retry_context().attempt, 0);
        assert!(!monitor.retry_pending());
    }

    #[test]
    fn test_connecting_does_not_mask_failure() {
        let mut monitor = monitor();
        let now = Instant::now();
        monitor.begin_attempt(now);
        monitor.report(
            MediaFailure::PermissionDenied.into_error(MediaKinds::AUDIO_ONLY),
            now,
        );

        monitor.on_transport_state(TransportState::Connecting, now);
        assert_eq!(monitor.state(), ConnectionState::Failed);
    }
}
