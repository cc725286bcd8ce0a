use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a client on the signaling channel
///
/// Opaque to the engine apart from its total order, which decides who
/// creates the offer in a session.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Whether `local` creates the offer when paired with `remote`.
///
/// The smaller identity initiates. Both sides evaluate this on their own and
/// always reach complementary answers. Identical identities never initiate.
pub fn initiates(local: &PeerId, remote: &PeerId) -> bool {
    local < remote
}

/// Display metadata the server attaches to a matched peer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Any other fields the server sends, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PeerInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Name to show in the UI
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Stranger")
    }
}

/// A user present in the chat room roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl RoomMember {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_side_initiates() {
        let pairs = [
            ("a", "b"),
            ("zeta", "alpha"),
            ("Xk2_9", "xk2_9"),
            ("socket-100", "socket-99"),
        ];

        for (a, b) in pairs {
            let a = PeerId::from(a);
            let b = PeerId::from(b);
            assert_ne!(
                initiates(&a, &b),
                initiates(&b, &a),
                "exactly one of {} / {} must initiate",
                a,
                b
            );
        }
    }

    #[test]
    fn test_initiator_is_the_smaller_identity() {
        let small = PeerId::from("abc");
        let large = PeerId::from("abd");

        assert!(initiates(&small, &large));
        assert!(!initiates(&large, &small));
    }

    #[test]
    fn test_identical_identities_never_initiate() {
        let id = PeerId::from("same");
        assert!(!initiates(&id, &id));
    }

    #[test]
    fn test_peer_info_keeps_unknown_fields() {
        let json = serde_json::json!({
            "name": "Alice",
            "email": "alice@example.com",
            "country": "DE"
        });

        let info: PeerInfo = serde_json::from_value(json).unwrap();
        assert_eq!(info.display_name(), "Alice");
        assert_eq!(info.extra.get("country"), Some(&serde_json::json!("DE")));
    }

    #[test]
    fn test_peer_info_without_name() {
        let info: PeerInfo = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(info.display_name(), "Stranger");
    }

    #[test]
    fn test_peer_id_serializes_as_plain_string() {
        let id = PeerId::from("socket-42");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("socket-42"));
    }
}
