//! Allow/deny modes and the single place match outcomes turn into verdicts.

use serde::{Deserialize, Serialize};

use super::rejection::Rejection;

/// How a matcher's outcome maps onto accept/reject.
///
/// - `Allow`: accept inputs that match (allow-list)
/// - `Deny`: reject inputs that match (deny-list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Allow,
    Deny,
}

/// Outcome of a leaf matcher.
///
/// `AlwaysAccept` and `AlwaysReject` bypass the configured [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    Mismatch,
    AlwaysAccept,
    AlwaysReject,
}

impl From<bool> for MatchResult {
    fn from(matched: bool) -> Self {
        if matched {
            MatchResult::Match
        } else {
            MatchResult::Mismatch
        }
    }
}

/// Decide whether an input with the given match outcome is accepted under `mode`.
pub fn should_accept(result: MatchResult, mode: Mode) -> bool {
    match (result, mode) {
        (MatchResult::AlwaysAccept, _) => true,
        (MatchResult::AlwaysReject, _) => false,
        (MatchResult::Match, Mode::Allow) => true,
        (MatchResult::Match, Mode::Deny) => false,
        (MatchResult::Mismatch, Mode::Allow) => false,
        (MatchResult::Mismatch, Mode::Deny) => true,
    }
}

/// Default rejection for a leaf matcher, worded for allow-lists or deny-lists.
pub(crate) fn reject_per_mode(mode: Mode, msg_allow: &str, msg_deny: &str) -> Rejection {
    match mode {
        Mode::Allow => Rejection::message(msg_allow),
        Mode::Deny => Rejection::message(msg_deny),
    }
}
