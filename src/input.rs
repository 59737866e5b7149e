//! Requests handed to sifters by the host relay, and the decisions sent back.
//!
//! The JSON shapes follow the relay's write-policy plugin protocol: one
//! [`Input`] object per line in, one [`Decision`] object per line out.

use serde::{Deserialize, Serialize};

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Sent by a client with an IPv4 address
    IP4,
    /// Sent by a client with an IPv6 address
    IP6,
    /// Imported from a file
    Import,
    /// Streamed from another relay
    Stream,
    /// Synced from another relay
    Sync,
}

impl SourceType {
    /// Whether the event was sent directly by an end-user client.
    pub fn is_end_user(&self) -> bool {
        matches!(self, SourceType::IP4 | SourceType::IP6)
    }
}

/// A Nostr event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pubkey: String,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

/// One sifting request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    /// Request type; the host only ever sends `"new"`
    #[serde(rename = "type")]
    pub kind: String,
    pub event: Event,
    /// Unix timestamp (seconds) of when the host received the event
    #[serde(default)]
    pub received_at: u64,
    pub source_type: SourceType,
    /// Client IP address for end-user sources, relay URL for streamed or
    /// synced events, empty for imports
    #[serde(default)]
    pub source_info: String,
}

impl Input {
    /// Build a `"new"` request for an event sent by a client at `addr`.
    pub fn from_client(event: Event, addr: &str) -> Self {
        let source_type = if addr.contains(':') {
            SourceType::IP6
        } else {
            SourceType::IP4
        };
        Self {
            kind: "new".to_string(),
            event,
            received_at: 0,
            source_type,
            source_info: addr.to_string(),
        }
    }

    /// Build a `"new"` request for an event with non-client provenance.
    pub fn relayed(event: Event, source_type: SourceType, source_info: &str) -> Self {
        Self {
            kind: "new".to_string(),
            event,
            received_at: 0,
            source_type,
            source_info: source_info.to_string(),
        }
    }

    /// Accept the event.
    pub fn accept(&self) -> Decision {
        Decision {
            id: self.event.id.clone(),
            action: Action::Accept,
            msg: String::new(),
        }
    }

    /// Reject the event with a message for the client.
    pub fn reject(&self, msg: impl Into<String>) -> Decision {
        Decision {
            id: self.event.id.clone(),
            action: Action::Reject,
            msg: msg.into(),
        }
    }

    /// Make the event look accepted to the client while dropping it.
    pub fn shadow_reject(&self) -> Decision {
        Decision {
            id: self.event.id.clone(),
            action: Action::ShadowReject,
            msg: String::new(),
        }
    }
}

/// What the host should do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Accept,
    Reject,
    ShadowReject,
}

/// The outcome of sifting one [`Input`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Id of the event the decision was made for
    pub id: String,
    pub action: Action,
    #[serde(default)]
    pub msg: String,
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        self.action == Action::Accept
    }
}

/// Machine-readable prefixes for rejection messages.
pub mod reason {
    pub const BLOCKED: &str = "blocked";
    pub const RATE_LIMITED: &str = "rate-limited";
    pub const INVALID: &str = "invalid";
    pub const POW: &str = "pow";
    pub const ERROR: &str = "error";
}

/// Build a `"prefix: body"` rejection message.
pub fn build_reject_message(prefix: &str, body: &str) -> String {
    format!("{}: {}", prefix, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_line() {
        let line = r#"{"type":"new","event":{"id":"abc","pubkey":"pk","created_at":1700000000,"kind":1,"tags":[["p","x"]],"content":"hi","sig":"s"},"receivedAt":1700000001,"sourceType":"IP4","sourceInfo":"127.0.0.1"}"#;
        let input: Input = serde_json::from_str(line).unwrap();

        assert_eq!(input.kind, "new");
        assert_eq!(input.event.id, "abc");
        assert_eq!(input.event.kind, 1);
        assert_eq!(input.event.tags, vec![vec!["p".to_string(), "x".to_string()]]);
        assert_eq!(input.received_at, 1700000001);
        assert_eq!(input.source_type, SourceType::IP4);
        assert_eq!(input.source_info, "127.0.0.1");
    }

    #[test]
    fn test_decision_serialization() {
        let input = Input::from_client(
            Event {
                id: "abc".to_string(),
                ..Default::default()
            },
            "127.0.0.1",
        );

        let json = serde_json::to_string(&input.shadow_reject()).unwrap();
        assert_eq!(json, r#"{"id":"abc","action":"shadowReject","msg":""}"#);

        let json = serde_json::to_string(&input.reject("blocked: nope")).unwrap();
        assert_eq!(json, r#"{"id":"abc","action":"reject","msg":"blocked: nope"}"#);
    }

    #[test]
    fn test_end_user_sources() {
        assert!(SourceType::IP4.is_end_user());
        assert!(SourceType::IP6.is_end_user());
        assert!(!SourceType::Import.is_end_user());
        assert!(!SourceType::Stream.is_end_user());
        assert!(!SourceType::Sync.is_end_user());
    }

    #[test]
    fn test_from_client_picks_address_family() {
        let v4 = Input::from_client(Event::default(), "192.168.1.1");
        let v6 = Input::from_client(Event::default(), "2001:db8::1");
        assert_eq!(v4.source_type, SourceType::IP4);
        assert_eq!(v6.source_type, SourceType::IP6);
    }

    #[test]
    fn test_build_reject_message() {
        assert_eq!(
            build_reject_message(reason::BLOCKED, "you are banned"),
            "blocked: you are banned"
        );
    }
}
