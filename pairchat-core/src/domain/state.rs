use crate::domain::error::ConnectionError;
use crate::domain::retry::RetryContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level matchmaking lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    #[default]
    Idle,
    Searching,
    Matched,
    Waiting,
    Chatting,
}

impl MatchState {
    /// States in which a `Session` must exist
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            MatchState::Matched | MatchState::Waiting | MatchState::Chatting
        )
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchState::Idle => "idle",
            MatchState::Searching => "searching",
            MatchState::Matched => "matched",
            MatchState::Waiting => "waiting",
            MatchState::Chatting => "chatting",
        };
        write!(f, "{}", name)
    }
}

/// Health of the peer transport as seen by the connection monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// What the user should currently see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Searching,
    Matched,
    Waiting,
    Connecting,
    Connected,
    Retrying {
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
    },
    Failed {
        message: String,
        retryable: bool,
    },
}

impl Phase {
    /// Derive the phase from the coordinator and monitor state
    pub fn resolve(
        match_state: MatchState,
        connection: ConnectionState,
        retry: &RetryContext,
        retry_pending: bool,
        last_error: Option<&ConnectionError>,
    ) -> Self {
        match match_state {
            MatchState::Idle => Phase::Idle,
            MatchState::Searching => Phase::Searching,
            MatchState::Matched => Phase::Matched,
            MatchState::Waiting => Phase::Waiting,
            MatchState::Chatting if retry_pending => Phase::Retrying {
                attempt: retry.attempt,
                max_attempts: retry.max_attempts,
                delay_ms: retry.scheduled_delay_ms,
            },
            MatchState::Chatting => match (connection, last_error) {
                (ConnectionState::Connected, _) => Phase::Connected,
                (ConnectionState::Failed, Some(error)) => Phase::Failed {
                    message: error.message.clone(),
                    retryable: error.retryable,
                },
                (ConnectionState::Failed, None) => Phase::Failed {
                    message: "Connection failed.".to_string(),
                    retryable: true,
                },
                _ => Phase::Connecting,
            },
        }
    }

    /// Short status line for the UI
    pub fn feedback(&self) -> String {
        match self {
            Phase::Idle => "Ready to chat".to_string(),
            Phase::Searching => "Searching...".to_string(),
            Phase::Matched => "Match found!".to_string(),
            Phase::Waiting => "Waiting for the other user to respond".to_string(),
            Phase::Connecting => "Connecting...".to_string(),
            Phase::Connected => "Connected".to_string(),
            Phase::Retrying {
                attempt,
                max_attempts,
                delay_ms,
            } => format!(
                "Connection failed. Retrying in {} seconds... ({}/{})",
                delay_ms / 1000,
                attempt,
                max_attempts
            ),
            Phase::Failed { message, retryable } => {
                if *retryable {
                    format!("{} Please try again manually.", message)
                } else {
                    message.clone()
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Searching => "searching",
            Phase::Matched => "matched",
            Phase::Waiting => "waiting",
            Phase::Connecting => "connecting",
            Phase::Connected => "connected",
            Phase::Retrying { .. } => "retrying",
            Phase::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
