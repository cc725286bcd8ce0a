use crate::domain::media::MediaKinds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy of the session engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Local device access
    Media,
    /// Signaling channel send / receive
    Signaling,
    /// Session description creation or application
    Negotiation,
    /// ICE candidate application (never fatal)
    Ice,
    /// Transport health failure or establishment timeout
    Connection,
    Generic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Media => "media",
            ErrorKind::Signaling => "signaling",
            ErrorKind::Negotiation => "negotiation",
            ErrorKind::Ice => "ice",
            ErrorKind::Connection => "connection",
            ErrorKind::Generic => "generic",
        };
        write!(f, "{}", name)
    }
}

/// A failure detected anywhere in the engine, consumed by the connection monitor
///
/// `message` is safe to show to the user. `detail` carries the raw cause and
/// is only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ConnectionError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub detail: Option<String>,
}

impl ConnectionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn signaling(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Signaling, message, true)
    }

    pub fn negotiation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Negotiation, message, true)
    }

    pub fn ice(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ice, message, true)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message, true)
    }

    pub fn connection_lost() -> Self {
        Self::new(
            ErrorKind::Connection,
            "Connection lost. Attempting to reconnect...",
            true,
        )
    }

    pub fn connection_timeout() -> Self {
        Self::new(
            ErrorKind::Connection,
            "Connection timeout. The connection took too long to establish.",
            true,
        )
    }

    /// ICE failures are swallowed where they happen
    pub fn is_fatal(&self) -> bool {
        self.kind != ErrorKind::Ice
    }
}

/// Why the capture backend could not provide local media
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFailure {
    PermissionDenied,
    DeviceInUse,
    NotFound,
    Other(String),
}

impl MediaFailure {
    /// Map a device failure to a `Media` error; only permission denial is final
    pub fn into_error(self, kinds: MediaKinds) -> ConnectionError {
        let label = kinds.device_label();
        let device = match (kinds.audio, kinds.video) {
            (true, true) => "Device",
            (false, true) => "Camera",
            _ => "Microphone",
        };
        let missing = match (kinds.audio, kinds.video) {
            (true, true) => "camera or microphone",
            (false, true) => "camera",
            _ => "microphone",
        };
        let prefix = format!("Failed to access {}.", label);

        match self {
            MediaFailure::PermissionDenied => {
                let wanted = match (kinds.audio, kinds.video) {
                    (true, true) => "camera and microphone",
                    (false, true) => "camera",
                    _ => "microphone",
                };
                ConnectionError::new(
                    ErrorKind::Media,
                    format!(
                        "{} Permission denied. Please allow {} access.",
                        prefix, wanted
                    ),
                    false,
                )
            }
            MediaFailure::DeviceInUse => ConnectionError::new(
                ErrorKind::Media,
                format!(
                    "{} {} is already in use by another application.",
                    prefix, device
                ),
                true,
            ),
            MediaFailure::NotFound => ConnectionError::new(
                ErrorKind::Media,
                format!("{} No {} found.", prefix, missing),
                true,
            ),
            MediaFailure::Other(reason) => ConnectionError::new(
                ErrorKind::Media,
                format!("{} Unknown media error.", prefix),
                true,
            )
            .with_detail(reason),
        }
    }
}
