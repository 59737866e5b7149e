//! Matchers over event fields: author, kind, tags and timestamp.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::mode::{reject_per_mode, MatchResult, Mode};
use super::rejection::Rejection;
use super::unit::SifterUnit;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Match the author (pubkey) with `matcher`.
pub fn author_matcher<F>(matcher: F, mode: Mode) -> SifterUnit
where
    F: Fn(&str) -> Result<bool> + Send + Sync + 'static,
{
    SifterUnit::new(
        move |input| matcher(&input.event.pubkey).map(MatchResult::from),
        mode,
        reject_per_mode(
            mode,
            "blocked: event author is not in the whitelist",
            "blocked: event author is in the blacklist",
        ),
    )
}

/// Check whether the author (pubkey) is in `authors`.
pub fn author_list<I, S>(authors: I, mode: Mode) -> SifterUnit
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: HashSet<String> = authors.into_iter().map(Into::into).collect();
    author_matcher(move |pubkey| Ok(set.contains(pubkey)), mode)
}

/// Predicates over event kinds, grouped by the protocol's kind ranges.
pub mod kinds {
    /// Non-parameterized replaceable: 0, 3, 41 and 10000..20000
    pub fn all_non_param_replaceable(k: u32) -> bool {
        k == 0 || k == 3 || k == 41 || (10000..20000).contains(&k)
    }

    /// Parameterized replaceable: 30000..40000
    pub fn all_param_replaceable(k: u32) -> bool {
        (30000..40000).contains(&k)
    }

    pub fn all_replaceable(k: u32) -> bool {
        all_non_param_replaceable(k) || all_param_replaceable(k)
    }

    /// Ephemeral: 20000..30000
    pub fn all_ephemeral(k: u32) -> bool {
        (20000..30000).contains(&k)
    }

    pub fn all_regular(k: u32) -> bool {
        !(all_replaceable(k) || all_ephemeral(k))
    }
}

fn kind_rejection(mode: Mode) -> Rejection {
    reject_per_mode(
        mode,
        "blocked: the kind of the event is not in the whitelist",
        "blocked: the kind of the event is in the blacklist",
    )
}

/// Match the kind with a fallible `matcher`.
pub fn kind_matcher_fallible<F>(matcher: F, mode: Mode) -> SifterUnit
where
    F: Fn(u32) -> Result<bool> + Send + Sync + 'static,
{
    SifterUnit::new(
        move |input| matcher(input.event.kind).map(MatchResult::from),
        mode,
        kind_rejection(mode),
    )
}

/// Match the kind with `matcher`.
pub fn kind_matcher<F>(matcher: F, mode: Mode) -> SifterUnit
where
    F: Fn(u32) -> bool + Send + Sync + 'static,
{
    kind_matcher_fallible(move |k| Ok(matcher(k)), mode)
}

/// Check whether the kind is in `kinds`.
pub fn kind_list(kinds: impl IntoIterator<Item = u32>, mode: Mode) -> SifterUnit {
    let set: HashSet<u32> = kinds.into_iter().collect();
    kind_matcher(move |k| set.contains(&k), mode)
}

/// Match the tag list with `matcher`.
pub fn tags_matcher<F>(matcher: F, mode: Mode) -> SifterUnit
where
    F: Fn(&[Vec<String>]) -> Result<bool> + Send + Sync + 'static,
{
    SifterUnit::new(
        move |input| matcher(&input.event.tags).map(MatchResult::from),
        mode,
        reject_per_mode(
            mode,
            "blocked: event tags don't match required patterns",
            "blocked: event tags match forbidden patterns",
        ),
    )
}

/// A time range relative to now. A zero delta leaves that side unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelativeTimeRange {
    pub max_past: Duration,
    pub max_future: Duration,
}

impl RelativeTimeRange {
    pub fn new(max_past: Duration, max_future: Duration) -> Self {
        Self {
            max_past,
            max_future,
        }
    }

    /// Whether `t` falls inside the range around `now`.
    pub fn contains(&self, t: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let earliest = bound(self.max_past, |d| now.checked_sub_signed(d));
        let latest = bound(self.max_future, |d| now.checked_add_signed(d));
        earliest.map_or(true, |lo| t >= lo) && latest.map_or(true, |hi| t <= hi)
    }
}

/// `None` when the side is unbounded, explicitly or by overflow.
fn bound<F>(delta: Duration, shift: F) -> Option<DateTime<Utc>>
where
    F: FnOnce(chrono::Duration) -> Option<DateTime<Utc>>,
{
    if delta.is_zero() {
        return None;
    }
    chrono::Duration::from_std(delta).ok().and_then(shift)
}

impl fmt::Display for RelativeTimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left = if self.max_past.is_zero() {
            "-∞".to_string()
        } else {
            format!("{:?} ago", self.max_past)
        };
        let right = if self.max_future.is_zero() {
            "+∞".to_string()
        } else {
            format!("{:?} after", self.max_future)
        };
        write!(f, "[{}, {}]", left, right)
    }
}

/// Check whether the event's `created_at` falls in `range`, relative to the system clock.
pub fn created_at_range(range: RelativeTimeRange, mode: Mode) -> SifterUnit {
    created_at_range_with_clock(range, mode, Arc::new(SystemClock::new()))
}

/// Like [`created_at_range`], reading the current time from `clock`.
pub fn created_at_range_with_clock(
    range: RelativeTimeRange,
    mode: Mode,
    clock: Arc<dyn Clock>,
) -> SifterUnit {
    let rejection = reject_per_mode(
        mode,
        &format!("invalid: event timestamp is out of the range: {}", range),
        &format!("blocked: event timestamp must be out of the range: {}", range),
    );
    SifterUnit::new(
        move |input| {
            // Timestamps chrono can't represent are outside any finite range.
            let contained = match Utc.timestamp_opt(input.event.created_at, 0).single() {
                Some(created_at) => range.contains(created_at, clock.utc_now()),
                None => false,
            };
            Ok(contained.into())
        },
        mode,
        rejection,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::error::SieveError;
    use crate::input::{Action, Event, Input};
    use crate::sifters::{Rejectable, Sifter};

    fn input_from(pubkey: &str, kind: u32) -> Input {
        Input::from_client(
            Event {
                id: "id".to_string(),
                pubkey: pubkey.to_string(),
                kind,
                ..Default::default()
            },
            "192.168.1.1",
        )
    }

    #[tokio::test]
    async fn test_author_list_modes() {
        let allow = author_list(["alice", "bob"], Mode::Allow);
        let deny = author_list(["alice", "bob"], Mode::Deny);

        assert_eq!(allow.sift(&input_from("alice", 1)).await.unwrap().action, Action::Accept);
        let res = allow.sift(&input_from("carol", 1)).await.unwrap();
        assert_eq!(res.msg, "blocked: event author is not in the whitelist");

        let res = deny.sift(&input_from("bob", 1)).await.unwrap();
        assert_eq!(res.msg, "blocked: event author is in the blacklist");
        assert_eq!(deny.sift(&input_from("carol", 1)).await.unwrap().action, Action::Accept);
    }

    #[tokio::test]
    async fn test_author_matcher_error_propagates() {
        let s = author_matcher(
            |_| Err(SieveError::Match("lookup failed".to_string())),
            Mode::Allow,
        );
        assert!(s.sift(&input_from("alice", 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_kind_list_and_matcher() {
        let s = kind_list([1, 7], Mode::Allow);
        assert!(s.sift(&input_from("a", 7)).await.unwrap().is_accept());
        assert!(!s.sift(&input_from("a", 3)).await.unwrap().is_accept());

        let s = kind_matcher(kinds::all_ephemeral, Mode::Deny).reject_with_msg("no ephemeral");
        assert!(s.sift(&input_from("a", 1)).await.unwrap().is_accept());
        assert_eq!(s.sift(&input_from("a", 20001)).await.unwrap().msg, "no ephemeral");
    }

    #[test]
    fn test_kind_classes() {
        assert!(kinds::all_non_param_replaceable(0));
        assert!(kinds::all_non_param_replaceable(10002));
        assert!(kinds::all_param_replaceable(30023));
        assert!(kinds::all_ephemeral(22242));
        assert!(kinds::all_regular(1));
        assert!(!kinds::all_regular(3));
        assert!(!kinds::all_regular(25000));
    }

    #[tokio::test]
    async fn test_tags_matcher() {
        let has_p = tags_matcher(
            |tags| Ok(tags.iter().any(|t| t.first().map(String::as_str) == Some("p"))),
            Mode::Allow,
        );
        let mut input = input_from("a", 1);
        assert!(!has_p.sift(&input).await.unwrap().is_accept());

        input.event.tags = vec![vec!["p".to_string(), "someone".to_string()]];
        assert!(has_p.sift(&input).await.unwrap().is_accept());
    }

    #[tokio::test]
    async fn test_created_at_range_with_mock_clock() {
        let clock = MockClock::starting_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let range = RelativeTimeRange::new(Duration::from_secs(600), Duration::from_secs(60));
        let s = created_at_range_with_clock(range, Mode::Allow, Arc::new(clock.clone()));

        let mut input = input_from("a", 1);
        for (created_at, ok) in [
            (1_700_000_000, true),
            (1_700_000_000 - 600, true),
            (1_700_000_000 - 601, false),
            (1_700_000_060, true),
            (1_700_000_061, false),
        ] {
            input.event.created_at = created_at;
            assert_eq!(s.sift(&input).await.unwrap().is_accept(), ok, "created_at={}", created_at);
        }

        // the range slides along with the clock
        input.event.created_at = 1_700_000_061;
        clock.advance(Duration::from_secs(1));
        assert!(s.sift(&input).await.unwrap().is_accept());
    }

    #[test]
    fn test_unbounded_range() {
        let now = Utc::now();
        let range = RelativeTimeRange::default();
        assert!(range.contains(now - chrono::Duration::days(3650), now));
        assert!(range.contains(now + chrono::Duration::days(3650), now));
        assert_eq!(range.to_string(), "[-∞, +∞]");
    }
}
