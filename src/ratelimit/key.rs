//! Rate limit key derivation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::input::Input;

/// What identifies a "user" for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKey {
    /// The client's source address
    IpAddr,
    /// The event author's pubkey
    PubKey,
}

/// Key under which rate limiter state is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitKey(String);

impl LimitKey {
    /// Derive the key for `input`.
    ///
    /// Returns `None` when the input shouldn't be rate limited: it didn't come
    /// from an end-user client, or the identity is an address that doesn't
    /// parse. With `per_kind`, the event kind is appended as `"<id>/<kind>"`.
    pub fn derive(input: &Input, user_key: UserKey, per_kind: bool) -> Option<Self> {
        if !input.source_type.is_end_user() {
            return None;
        }
        let identity = match user_key {
            UserKey::IpAddr => {
                input.source_info.parse::<IpAddr>().ok()?;
                input.source_info.as_str()
            }
            UserKey::PubKey => input.event.pubkey.as_str(),
        };
        let key = if per_kind {
            format!("{}/{}", identity, input.event.kind)
        } else {
            identity.to_string()
        };
        Some(LimitKey(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Event, SourceType};

    fn input(pubkey: &str, kind: u32, addr: &str) -> Input {
        Input::from_client(
            Event {
                pubkey: pubkey.to_string(),
                kind,
                ..Default::default()
            },
            addr,
        )
    }

    #[test]
    fn test_derive_by_pubkey() {
        let i = input("alice", 1, "192.168.1.1");
        assert_eq!(LimitKey::derive(&i, UserKey::PubKey, false).unwrap().as_str(), "alice");
        assert_eq!(LimitKey::derive(&i, UserKey::PubKey, true).unwrap().as_str(), "alice/1");
    }

    #[test]
    fn test_derive_by_ip() {
        let i = input("alice", 7, "2001:db8::1");
        assert_eq!(LimitKey::derive(&i, UserKey::IpAddr, false).unwrap().as_str(), "2001:db8::1");
        let per_kind = LimitKey::derive(&i, UserKey::IpAddr, true).unwrap();
        assert_eq!(per_kind.to_string(), "2001:db8::1/7");
    }

    #[test]
    fn test_invalid_address_is_not_limited() {
        let i = input("alice", 1, "unknown");
        assert!(LimitKey::derive(&i, UserKey::IpAddr, false).is_none());
        // the pubkey is still usable
        assert!(LimitKey::derive(&i, UserKey::PubKey, false).is_some());
    }

    #[test]
    fn test_relayed_input_is_not_limited() {
        for source in [SourceType::Import, SourceType::Stream, SourceType::Sync] {
            let i = Input::relayed(Event::default(), source, "wss://relay.example.com");
            assert!(LimitKey::derive(&i, UserKey::PubKey, false).is_none());
            assert!(LimitKey::derive(&i, UserKey::IpAddr, true).is_none());
        }
    }

    #[test]
    fn test_distinct_identities_get_distinct_keys() {
        let a = LimitKey::derive(&input("a", 1, "10.0.0.1"), UserKey::PubKey, false);
        let b = LimitKey::derive(&input("b", 1, "10.0.0.1"), UserKey::PubKey, false);
        assert_ne!(a, b);
    }
}
