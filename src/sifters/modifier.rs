//! Modifiers: labels, accept-early and guard conditions.
//!
//! Modifiers only mean something to the combinators that inspect them.
//! Sifting a [`Modded`] directly just delegates to the wrapped sifter.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::{SharedSifter, Sifter};
use crate::error::{Result, SieveError};
use crate::input::{Decision, Input};

/// A condition deciding whether a modified sifter is applied at all.
#[derive(Clone)]
pub struct Guard {
    cond: SharedSifter,
    if_accepted: bool,
}

impl Guard {
    /// Apply when `cond` accepts.
    pub fn only_if(cond: impl Sifter + 'static) -> Self {
        Self {
            cond: Arc::new(cond),
            if_accepted: true,
        }
    }

    /// Apply when `cond` does not accept.
    pub fn only_if_not(cond: impl Sifter + 'static) -> Self {
        Self {
            cond: Arc::new(cond),
            if_accepted: false,
        }
    }

    /// Whether the guarded sifter should be applied to `input`.
    pub async fn is_met(&self, input: &Input) -> Result<bool> {
        let res = self
            .cond
            .sift(input)
            .await
            .map_err(|e| SieveError::Guard(Box::new(e)))?;
        Ok(res.is_accept() == self.if_accepted)
    }
}

/// A sifter carrying modifiers.
#[derive(Clone)]
pub struct Modded {
    inner: SharedSifter,
    label: String,
    accept_early: bool,
    guard: Option<Guard>,
}

/// Make a sifter modifiable.
pub fn with_mod(s: impl Sifter + 'static) -> Modded {
    Modded {
        inner: Arc::new(s),
        label: String::new(),
        accept_early: false,
        guard: None,
    }
}

impl Modded {
    /// Wrap an already shared sifter.
    pub fn from_shared(inner: SharedSifter) -> Self {
        Self {
            inner,
            label: String::new(),
            accept_early: false,
            guard: None,
        }
    }

    /// Identity; lets `modded()` be called uniformly on plain and modified sifters.
    pub fn modded(self) -> Self {
        self
    }

    /// Name the sifter in logs.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Inside a pipeline, accept immediately when this sifter accepts.
    pub fn accept_early(mut self) -> Self {
        self.accept_early = true;
        self
    }

    /// Inside a combinator, only apply this sifter if `cond` accepts the input.
    pub fn only_if(mut self, cond: impl Sifter + 'static) -> Self {
        self.guard = Some(Guard::only_if(cond));
        self
    }

    /// Inside a combinator, only apply this sifter if `cond` doesn't accept the input.
    pub fn only_if_not(mut self, cond: impl Sifter + 'static) -> Self {
        self.guard = Some(Guard::only_if_not(cond));
        self
    }

    /// Attach an already built guard.
    pub fn guarded(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn get_label(&self) -> &str {
        &self.label
    }

    pub fn is_accept_early(&self) -> bool {
        self.accept_early
    }

    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    pub(crate) fn label_if_unset(&mut self, label: impl FnOnce() -> String) {
        if self.label.is_empty() {
            self.label = label();
        }
    }

    /// Whether a combinator should apply this sifter to `input`.
    pub(crate) async fn applies_to(&self, input: &Input) -> Result<bool> {
        match &self.guard {
            Some(guard) => guard.is_met(input).await,
            None => Ok(true),
        }
    }
}

#[async_trait]
impl Sifter for Modded {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        self.inner.sift(input).await
    }
}

impl fmt::Debug for Modded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modded")
            .field("label", &self.label)
            .field("accept_early", &self.accept_early)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

/// Modifier methods for any sifter.
///
/// [`Modded`] has inherent methods with the same names, so chaining on an
/// already modified sifter keeps its earlier modifiers.
pub trait SifterExt: Sifter + Sized + 'static {
    fn modded(self) -> Modded {
        with_mod(self)
    }

    fn label(self, label: impl Into<String>) -> Modded {
        with_mod(self).label(label)
    }

    fn accept_early(self) -> Modded {
        with_mod(self).accept_early()
    }

    fn only_if(self, cond: impl Sifter + 'static) -> Modded {
        with_mod(self).only_if(cond)
    }

    fn only_if_not(self, cond: impl Sifter + 'static) -> Modded {
        with_mod(self).only_if_not(cond)
    }
}

impl<S: Sifter + Sized + 'static> SifterExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Action;
    use crate::sifters::testing::*;
    use crate::sifters::{accept_all, kind_list, Mode};

    #[tokio::test]
    async fn test_direct_sift_ignores_modifiers() {
        let s = reject_all("nope").accept_early().only_if_not(accept_all());
        let res = s.sift(&dummy_input()).await.unwrap();
        assert_eq!(res.action, Action::Reject);
        assert_eq!(res.msg, "nope");
    }

    #[tokio::test]
    async fn test_chaining_keeps_modifiers() {
        let s = accept_all().label("first").accept_early().only_if(accept_all());
        assert_eq!(s.get_label(), "first");
        assert!(s.is_accept_early());
        assert!(s.guard().is_some());
    }

    #[tokio::test]
    async fn test_guard_polarities_are_complements() {
        for kind in [1, 2] {
            let input = input_with_kind(kind);
            let pos = Guard::only_if(kind_list([1], Mode::Allow));
            let neg = Guard::only_if_not(kind_list([1], Mode::Allow));
            let (p, n) = (pos.is_met(&input).await.unwrap(), neg.is_met(&input).await.unwrap());
            assert_ne!(p, n);
            assert_eq!(p, kind == 1);
        }
    }

    #[tokio::test]
    async fn test_guard_error_is_wrapped() {
        let guard = Guard::only_if(failing("bad cond"));
        let err = guard.is_met(&dummy_input()).await.unwrap_err();
        assert!(matches!(err, SieveError::Guard(_)));
    }
}
