//! Reply assembly from a raw fragment stream.
//!
//! The model's fragment stream never ends on its own. [`ReplyBuilder`] applies
//! the stop policy one fragment at a time:
//!
//! 1. leading whitespace is stripped while the reply is still empty;
//! 2. a fragment that is exactly `"\n"` ends the reply and is dropped;
//! 3. any other fragment containing a newline is an invariant violation;
//! 4. once the reply reaches the length limit it is truncated to the limit,
//!    suffixed with `" ..."`, and ends.

use futures_util::{Stream, StreamExt};
use thiserror::Error;

use parley_types::error::ModelError;

/// Suffix appended to replies cut at the length limit.
pub const TRUNCATION_SUFFIX: &str = " ...";

/// Errors raised while assembling a reply.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A decoded fragment carried a newline alongside other text. The stop
    /// rule cannot be applied to it, so generation cannot continue.
    #[error("decoded fragment contains an embedded newline: {0:?}")]
    EmbeddedNewline(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Whether more fragments are wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// Accumulates fragments into a reply under the stop policy.
#[derive(Debug)]
pub struct ReplyBuilder {
    text: String,
    chars: usize,
    limit: usize,
}

impl ReplyBuilder {
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            limit,
        }
    }

    /// Feed the next fragment.
    pub fn push(&mut self, fragment: &str) -> Result<Flow, GenerationError> {
        let fragment = if self.text.is_empty() {
            fragment.trim_start()
        } else {
            fragment
        };

        if fragment == "\n" {
            return Ok(Flow::Done);
        }
        if fragment.contains('\n') {
            return Err(GenerationError::EmbeddedNewline(fragment.to_string()));
        }

        self.text.push_str(fragment);
        self.chars += fragment.chars().count();

        if self.chars >= self.limit {
            if self.chars > self.limit {
                self.text = self.text.chars().take(self.limit).collect();
                self.chars = self.limit;
            }
            self.text.push_str(TRUNCATION_SUFFIX);
            return Ok(Flow::Done);
        }
        Ok(Flow::Continue)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// Drain `fragments` through a [`ReplyBuilder`] until the policy stops.
///
/// A stream that runs dry before a stop fragment yields what was collected.
pub async fn collect_reply<S>(fragments: S, limit: usize) -> Result<String, GenerationError>
where
    S: Stream<Item = Result<String, ModelError>>,
{
    futures_util::pin_mut!(fragments);
    let mut builder = ReplyBuilder::new(limit);
    while let Some(fragment) = fragments.next().await {
        if builder.push(&fragment?)? == Flow::Done {
            break;
        }
    }
    Ok(builder.finish())
}
