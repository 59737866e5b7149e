//! The host loop: one JSON input per line in, one JSON decision per line out.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SieveError};
use crate::input::{build_reject_message, reason, Action, Decision, Input};
use crate::sifters::{accept_all, SharedSifter};

const ERROR_BODY: &str = "event sifter failed to process input";

/// Drives a sifter over the host relay's line protocol.
#[derive(Clone)]
pub struct Runner {
    sifter: SharedSifter,
}

impl Runner {
    pub fn new(sifter: SharedSifter) -> Self {
        Self { sifter }
    }

    /// Replace the sifter.
    pub fn sift_with(&mut self, sifter: SharedSifter) {
        self.sifter = sifter;
    }

    /// Process every line of `reader` until EOF, writing decisions to
    /// `writer` in input order.
    ///
    /// Only I/O failures end the loop; a malformed or blank line or a sifter
    /// error becomes a rejection of that one input, so every line gets
    /// exactly one decision.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut processed: u64 = 0;

        while let Some(line) = lines.next_line().await? {
            let decision = self.handle_line(&line).await;
            let mut out = serde_json::to_vec(&decision)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
            processed += 1;
        }

        info!(processed, "Input closed");
        Ok(())
    }

    /// Decide on one raw input line.
    pub async fn handle_line(&self, line: &str) -> Decision {
        let input: Input = match serde_json::from_str(line) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "Failed to parse input line");
                return error_decision(String::new());
            }
        };

        match self.sift(&input).await {
            Ok(decision) => {
                if decision.action != Action::Accept {
                    debug!(
                        id = %decision.id,
                        action = ?decision.action,
                        msg = %decision.msg,
                        "Event not accepted"
                    );
                }
                decision
            }
            Err(e) => {
                error!(id = %input.event.id, error = %e, "Failed to sift event");
                error_decision(input.event.id)
            }
        }
    }

    async fn sift(&self, input: &Input) -> Result<Decision> {
        if input.kind != "new" {
            return Err(SieveError::InvalidInput(format!("unexpected input type: {}", input.kind)));
        }
        self.sifter.sift(input).await
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(std::sync::Arc::new(accept_all()))
    }
}

fn error_decision(id: String) -> Decision {
    Decision {
        id,
        action: Action::Reject,
        msg: build_reject_message(reason::ERROR, ERROR_BODY),
    }
}
