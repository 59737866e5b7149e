//! Composable event sifters.
//!
//! Every policy building block, from leaf matchers to combinators and the
//! rate limiter, implements the single [`Sifter`] trait. Combinators own
//! their children and hold no mutable state, so one tree can be shared
//! across concurrently processed inputs.

mod combinators;
mod content;
mod event;
mod mode;
mod modifier;
mod pow;
mod rejection;
mod source;
mod unit;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::input::{Decision, Input};

pub use combinators::{if_not_then, if_then, one_of, pipeline, Conditional, OneOf, Pipeline};
pub use content::{
    content_has_all_words, content_has_any_word, content_matcher, content_matches_all_regexes,
    content_matches_any_regex,
};
pub use event::{
    author_list, author_matcher, created_at_range, created_at_range_with_clock, kind_list,
    kind_matcher, kind_matcher_fallible, kinds, tags_matcher, RelativeTimeRange,
};
pub use mode::{should_accept, MatchResult, Mode};
pub use modifier::{with_mod, Guard, Modded, SifterExt};
pub use pow::{leading_zero_bits, pow_min_difficulty};
pub use rejection::{Rejectable, Rejection};
pub use source::{parse_ip_prefix_list, source_ip_matcher, source_ip_prefix_list, IpPrefix};
pub use unit::SifterUnit;

/// A unit of sifting logic: decides what to do with one input.
///
/// An `Err` means the input couldn't be judged at all; combinators abort
/// and hand it up instead of converting it into a decision.
#[async_trait]
pub trait Sifter: Send + Sync {
    async fn sift(&self, input: &Input) -> Result<Decision>;
}

/// Shared, type-erased sifter.
pub type SharedSifter = Arc<dyn Sifter>;

#[async_trait]
impl<S: Sifter + ?Sized> Sifter for Arc<S> {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        (**self).sift(input).await
    }
}

#[async_trait]
impl<S: Sifter + ?Sized> Sifter for Box<S> {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        (**self).sift(input).await
    }
}

/// Adapter turning a synchronous closure into a [`Sifter`].
pub struct SifterFn<F>(F);

/// Wrap a closure as a [`Sifter`].
pub fn sifter_fn<F>(f: F) -> SifterFn<F>
where
    F: Fn(&Input) -> Result<Decision> + Send + Sync,
{
    SifterFn(f)
}

#[async_trait]
impl<F> Sifter for SifterFn<F>
where
    F: Fn(&Input) -> Result<Decision> + Send + Sync,
{
    async fn sift(&self, input: &Input) -> Result<Decision> {
        (self.0)(input)
    }
}

/// A sifter that accepts everything.
pub fn accept_all() -> SifterFn<impl Fn(&Input) -> Result<Decision> + Send + Sync> {
    sifter_fn(|input: &Input| Ok(input.accept()))
}

/// Build a [`Pipeline`] from any mix of plain and modified sifters.
///
/// ```
/// use eventsieve::sifters::{accept_all, kind_list, Mode, SifterExt};
///
/// let p = eventsieve::pipeline![
///     kind_list([1], Mode::Allow).label("text notes only"),
///     accept_all(),
/// ];
/// # let _ = p;
/// ```
#[macro_export]
macro_rules! pipeline {
    ($($child:expr),* $(,)?) => {{
        #[allow(unused_imports)]
        use $crate::sifters::SifterExt as _;
        $crate::sifters::pipeline(vec![$(($child).modded()),*])
    }};
}

/// Build a [`OneOf`] from any mix of plain and modified sifters.
#[macro_export]
macro_rules! one_of {
    ($($child:expr),* $(,)?) => {{
        #[allow(unused_imports)]
        use $crate::sifters::SifterExt as _;
        $crate::sifters::one_of(vec![$(($child).modded()),*])
    }};
}
