use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const OPENRELAY_USER: &str = "openrelayproject";
const OPENRELAY_CREDENTIAL: &str = "openrelayproject";

/// STUN / TURN server handed to the peer transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IceServer {
    /// Server URLs (can have multiple for failover)
    pub urls: Vec<String>,
    /// Username for authentication (required for TURN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Credential for authentication (required for TURN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self::stun(url).with_auth(username, credential)
    }

    pub fn with_auth(mut self, username: impl Into<String>, credential: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.credential = Some(credential.into());
        self
    }

    /// Whether any URL points at a relay
    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|url| url.starts_with("turn:") || url.starts_with("turns:"))
    }

    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.username, &self.credential),
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty()
        )
    }

    /// Google STUN plus the public openrelay TURN endpoints (UDP 80, UDP 443, TCP 443)
    pub fn voice_defaults() -> Vec<Self> {
        vec![
            Self::stun("stun:stun.l.google.com:19302"),
            Self::turn(
                "turn:openrelay.metered.ca:80",
                OPENRELAY_USER,
                OPENRELAY_CREDENTIAL,
            ),
            Self::turn(
                "turn:openrelay.metered.ca:443",
                OPENRELAY_USER,
                OPENRELAY_CREDENTIAL,
            ),
            Self::turn(
                "turn:openrelay.metered.ca:443?transport=tcp",
                OPENRELAY_USER,
                OPENRELAY_CREDENTIAL,
            ),
        ]
    }

    /// Two Google STUN servers plus one openrelay TURN endpoint
    pub fn video_defaults() -> Vec<Self> {
        vec![
            Self::stun("stun:stun.l.google.com:19302"),
            Self::stun("stun:stun1.l.google.com:19302"),
            Self::turn(
                "turn:openrelay.metered.ca:80",
                OPENRELAY_USER,
                OPENRELAY_CREDENTIAL,
            ),
        ]
    }
}
