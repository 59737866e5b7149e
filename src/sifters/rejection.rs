//! Rejection strategies.

use std::fmt;
use std::sync::Arc;

use crate::input::{Decision, Input};

type MessageFn = Arc<dyn Fn(&Input) -> String + Send + Sync>;

/// How a sifter rejects an input it didn't accept.
#[derive(Clone)]
pub enum Rejection {
    /// Reject with a fixed message
    Message(String),
    /// Pretend to accept, but drop the event
    Shadow,
    /// Reject with a message computed from the input
    FromInput(MessageFn),
}

impl Rejection {
    pub fn message(msg: impl Into<String>) -> Self {
        Rejection::Message(msg.into())
    }

    pub fn from_input<F>(f: F) -> Self
    where
        F: Fn(&Input) -> String + Send + Sync + 'static,
    {
        Rejection::FromInput(Arc::new(f))
    }

    /// Produce the rejecting decision for `input`.
    pub fn apply(&self, input: &Input) -> Decision {
        match self {
            Rejection::Message(msg) => input.reject(msg.clone()),
            Rejection::Shadow => input.shadow_reject(),
            Rejection::FromInput(f) => input.reject(f(input)),
        }
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Message(msg) => f.debug_tuple("Message").field(msg).finish(),
            Rejection::Shadow => f.write_str("Shadow"),
            Rejection::FromInput(_) => f.write_str("FromInput(..)"),
        }
    }
}

/// Fluent rejection overrides shared by every sifter that can reject on its own.
pub trait Rejectable: Sized {
    #[doc(hidden)]
    fn rejection_mut(&mut self) -> &mut Rejection;

    /// Reject with the given message.
    fn reject_with_msg(mut self, msg: impl Into<String>) -> Self {
        *self.rejection_mut() = Rejection::message(msg);
        self
    }

    /// Reject with a message derived from the input.
    fn reject_with_msg_from_input<F>(mut self, f: F) -> Self
    where
        F: Fn(&Input) -> String + Send + Sync + 'static,
    {
        *self.rejection_mut() = Rejection::from_input(f);
        self
    }

    /// Shadow-reject instead of rejecting.
    fn shadow_reject(mut self) -> Self {
        *self.rejection_mut() = Rejection::Shadow;
        self
    }
}
