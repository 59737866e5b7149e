//! Eventsieve - composable write policies for Nostr relays
//!
//! This crate decides, for every event a relay receives, whether to accept,
//! reject or shadow-reject it. Policies are trees of small [`sifters`]
//! combined with pipelines, alternatives and conditionals, including
//! per-user GCRA rate limiting from [`ratelimit`]. The [`runner`] drives a
//! policy over the relay's line-delimited JSON plugin protocol.

pub mod clock;
pub mod config;
pub mod error;
pub mod input;
pub mod policy;
pub mod ratelimit;
pub mod runner;
pub mod sifters;
