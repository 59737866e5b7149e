//! The shared shape of every leaf matcher.

use async_trait::async_trait;
use std::fmt;

use super::mode::{should_accept, MatchResult, Mode};
use super::rejection::{Rejectable, Rejection};
use super::Sifter;
use crate::error::Result;
use crate::input::{Decision, Input};

type Matcher = Box<dyn Fn(&Input) -> Result<MatchResult> + Send + Sync>;

/// A matcher paired with a [`Mode`] and a [`Rejection`].
///
/// All built-in leaf sifters are `SifterUnit`s; construct them through the
/// functions in this module (`author_list`, `kind_list`, ...) and override the
/// default rejection via [`Rejectable`].
pub struct SifterUnit {
    matcher: Matcher,
    mode: Mode,
    rejection: Rejection,
}

impl SifterUnit {
    pub(crate) fn new<F>(matcher: F, mode: Mode, rejection: Rejection) -> Self
    where
        F: Fn(&Input) -> Result<MatchResult> + Send + Sync + 'static,
    {
        Self {
            matcher: Box::new(matcher),
            mode,
            rejection,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

#[async_trait]
impl Sifter for SifterUnit {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        let matched = (self.matcher)(input)?;
        if should_accept(matched, self.mode) {
            Ok(input.accept())
        } else {
            Ok(self.rejection.apply(input))
        }
    }
}

impl Rejectable for SifterUnit {
    fn rejection_mut(&mut self) -> &mut Rejection {
        &mut self.rejection
    }
}

impl fmt::Debug for SifterUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SifterUnit")
            .field("mode", &self.mode)
            .field("rejection", &self.rejection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SieveError;
    use crate::input::Action;
    use crate::sifters::testing::dummy_input;

    fn no() -> Rejection {
        Rejection::message("no")
    }

    #[tokio::test]
    async fn test_unit_applies_mode() {
        let allow = SifterUnit::new(|_| Ok(MatchResult::Match), Mode::Allow, no());
        let deny = SifterUnit::new(|_| Ok(MatchResult::Match), Mode::Deny, no());

        assert_eq!(allow.sift(&dummy_input()).await.unwrap().action, Action::Accept);
        let d = deny.sift(&dummy_input()).await.unwrap();
        assert_eq!(d.action, Action::Reject);
        assert_eq!(d.msg, "no");
    }

    #[tokio::test]
    async fn test_unit_rejection_override() {
        let unit =
            SifterUnit::new(|_| Ok(MatchResult::AlwaysReject), Mode::Allow, no()).shadow_reject();
        assert_eq!(unit.sift(&dummy_input()).await.unwrap().action, Action::ShadowReject);
    }

    #[tokio::test]
    async fn test_unit_propagates_matcher_error() {
        let unit = SifterUnit::new(
            |_| Err(SieveError::Match("broken".to_string())),
            Mode::Allow,
            Rejection::message("no"),
        );
        let err = unit.sift(&dummy_input()).await.unwrap_err();
        assert!(matches!(err, SieveError::Match(_)));
    }
}
