//! Matchers over event content. All matching is case-sensitive.

use regex::Regex;

use super::mode::{reject_per_mode, MatchResult, Mode};
use super::unit::SifterUnit;
use crate::error::Result;

/// Match the content with `matcher`.
pub fn content_matcher<F>(matcher: F, mode: Mode) -> SifterUnit
where
    F: Fn(&str) -> Result<bool> + Send + Sync + 'static,
{
    SifterUnit::new(
        move |input| matcher(&input.event.content).map(MatchResult::from),
        mode,
        reject_per_mode(
            mode,
            "blocked: content must obey some rules to be accepted",
            "blocked: content conflicts with some rules",
        ),
    )
}

fn to_strings<I, S>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    words.into_iter().map(Into::into).collect()
}

/// Check whether the content contains any of `words`.
pub fn content_has_any_word<I, S>(words: I, mode: Mode) -> SifterUnit
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let words = to_strings(words);
    SifterUnit::new(
        move |input| {
            let content = &input.event.content;
            Ok(words.iter().any(|w| content.contains(w.as_str())).into())
        },
        mode,
        reject_per_mode(
            mode,
            "blocked: content must have one of keywords to be accepted",
            "blocked: content has one of forbidden words",
        ),
    )
}

/// Check whether the content contains all of `words`.
pub fn content_has_all_words<I, S>(words: I, mode: Mode) -> SifterUnit
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let words = to_strings(words);
    SifterUnit::new(
        move |input| {
            let content = &input.event.content;
            Ok(words.iter().all(|w| content.contains(w.as_str())).into())
        },
        mode,
        reject_per_mode(
            mode,
            "blocked: content must have all keywords to be accepted",
            "blocked: content has all of forbidden words",
        ),
    )
}

/// Check whether the content matches any of `regexes`.
pub fn content_matches_any_regex(regexes: Vec<Regex>, mode: Mode) -> SifterUnit {
    SifterUnit::new(
        move |input| {
            let content = &input.event.content;
            Ok(regexes.iter().any(|r| r.is_match(content)).into())
        },
        mode,
        reject_per_mode(
            mode,
            "blocked: content must match one of key-patterns to be accepted",
            "blocked: content matches one of forbidden patterns",
        ),
    )
}

/// Check whether the content matches all of `regexes`.
pub fn content_matches_all_regexes(regexes: Vec<Regex>, mode: Mode) -> SifterUnit {
    SifterUnit::new(
        move |input| {
            let content = &input.event.content;
            Ok(regexes.iter().all(|r| r.is_match(content)).into())
        },
        mode,
        reject_per_mode(
            mode,
            "blocked: content must match all of key-patterns to be accepted",
            "blocked: content matches all of forbidden patterns",
        ),
    )
}
