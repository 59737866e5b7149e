//! Combinators: Pipeline (all must accept), OneOf (any may accept) and the
//! two-unit conditionals.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};

use super::modifier::Modded;
use super::rejection::{Rejectable, Rejection};
use super::{SharedSifter, Sifter};
use crate::error::Result;
use crate::input::{Decision, Input};

const ONE_OF_DEFAULT_REJECTION: &str = "blocked: any of sub-sifters didn't accept the event";

fn assign_default_labels(mut children: Vec<Modded>) -> Vec<Modded> {
    for (i, child) in children.iter_mut().enumerate() {
        child.label_if_unset(|| format!("sifter #{}", i));
    }
    children
}

/// Accepts an input only if every applied child accepts it.
///
/// Children are applied in order. A child whose guard isn't met is skipped.
/// The first child that doesn't accept decides the result; a child marked
/// accept-early that accepts ends evaluation with acceptance. If nothing
/// rejected, the pipeline accepts.
#[derive(Debug)]
pub struct Pipeline {
    children: Vec<Modded>,
}

impl Pipeline {
    pub fn new(children: Vec<Modded>) -> Self {
        Self {
            children: assign_default_labels(children),
        }
    }

    pub fn children(&self) -> &[Modded] {
        &self.children
    }
}

/// Combine modified sifters into a [`Pipeline`]. See also [`crate::pipeline!`].
pub fn pipeline(children: Vec<Modded>) -> Pipeline {
    Pipeline::new(children)
}

#[async_trait]
impl Sifter for Pipeline {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        for child in &self.children {
            if !child.applies_to(input).await? {
                trace!(
                    sifter = %child.get_label(),
                    id = %input.event.id,
                    "Condition not met, skipping"
                );
                continue;
            }

            let res = child.sift(input).await?;

            if !res.is_accept() {
                debug!(
                    sifter = %child.get_label(),
                    id = %input.event.id,
                    action = ?res.action,
                    "Pipeline rejected event"
                );
                return Ok(res);
            }
            if child.is_accept_early() {
                trace!(sifter = %child.get_label(), id = %input.event.id, "Accepted early");
                return Ok(res);
            }
        }
        Ok(input.accept())
    }
}

/// Accepts an input as soon as one applied child accepts it.
///
/// Guards are honored like in [`Pipeline`]; accept-early has no extra effect.
/// If no child accepts (including when all were skipped), the input is
/// rejected with the configured [`Rejection`].
#[derive(Debug)]
pub struct OneOf {
    children: Vec<Modded>,
    rejection: Rejection,
}

impl OneOf {
    pub fn new(children: Vec<Modded>) -> Self {
        Self {
            children: assign_default_labels(children),
            rejection: Rejection::message(ONE_OF_DEFAULT_REJECTION),
        }
    }

    pub fn children(&self) -> &[Modded] {
        &self.children
    }
}

/// Combine modified sifters into a [`OneOf`]. See also [`crate::one_of!`].
pub fn one_of(children: Vec<Modded>) -> OneOf {
    OneOf::new(children)
}

#[async_trait]
impl Sifter for OneOf {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        for child in &self.children {
            if !child.applies_to(input).await? {
                trace!(
                    sifter = %child.get_label(),
                    id = %input.event.id,
                    "Condition not met, skipping"
                );
                continue;
            }

            let res = child.sift(input).await?;
            if res.is_accept() {
                trace!(sifter = %child.get_label(), id = %input.event.id, "OneOf accepted event");
                return Ok(res);
            }
        }
        debug!(id = %input.event.id, "No sub-sifter accepted event");
        Ok(self.rejection.apply(input))
    }
}

impl Rejectable for OneOf {
    fn rejection_mut(&mut self) -> &mut Rejection {
        &mut self.rejection
    }
}

/// Applies `body` only when `cond`'s verdict has the required polarity;
/// otherwise accepts.
pub struct Conditional {
    cond: SharedSifter,
    body: SharedSifter,
    when_accepted: bool,
}

/// Apply `body` only if `cond` accepts the input.
pub fn if_then(cond: impl Sifter + 'static, body: impl Sifter + 'static) -> Conditional {
    Conditional {
        cond: Arc::new(cond),
        body: Arc::new(body),
        when_accepted: true,
    }
}

/// Apply `body` only if `cond` doesn't accept the input.
pub fn if_not_then(cond: impl Sifter + 'static, body: impl Sifter + 'static) -> Conditional {
    Conditional {
        cond: Arc::new(cond),
        body: Arc::new(body),
        when_accepted: false,
    }
}

impl Conditional {
    pub(crate) fn from_shared(cond: SharedSifter, body: SharedSifter, when_accepted: bool) -> Self {
        Self {
            cond,
            body,
            when_accepted,
        }
    }
}

#[async_trait]
impl Sifter for Conditional {
    async fn sift(&self, input: &Input) -> Result<Decision> {
        let cond = self.cond.sift(input).await?;
        if cond.is_accept() == self.when_accepted {
            self.body.sift(input).await
        } else {
            Ok(input.accept())
        }
    }
}
