//! Streaming message assembler.
//!
//! Turns the fragment stream of one exchange into a sequence of cumulative
//! [`Snapshot`]s addressed to a single assistant message.
//!
//! # Algorithm
//!
//! 1. Keep one growing buffer per exchange.
//! 2. For every fragment (zero-length included), append it and emit
//!    `{ text: buffer, streaming: true }`.
//! 3. When the stream is exhausted, emit `{ text: buffer, streaming: false }`.
//! 4. If the stream never opened, emit a single terminal failure snapshot and
//!    nothing else.
//! 5. If a read fails mid-stream, emit a terminal failure snapshot whose text
//!    is [`FALLBACK_MESSAGE`]; the partial text is not shown.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::assembler::assemble;
//! use docqa_core::models::MessageId;
//! use futures::{stream, StreamExt};
//!
//! let fragments = stream::iter(vec![Ok("Hel".to_string()), Ok("lo".to_string())]).boxed();
//! let snaps: Vec<_> = futures::executor::block_on(
//!     assemble(MessageId(1), Ok(fragments)).collect::<Vec<_>>(),
//! );
//! assert_eq!(snaps.last().unwrap().text, "Hello");
//! assert!(!snaps.last().unwrap().streaming);
//! ```

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{TransportError, FALLBACK_MESSAGE};
use crate::models::MessageId;
use crate::transport::FragmentStream;

/// Point-in-time view of an answer being assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Assistant message this snapshot is meant for.
    pub target: MessageId,
    pub text: String,
    pub streaming: bool,
    /// Set on the terminal snapshot of a failed exchange.
    pub failure: Option<String>,
}

impl Snapshot {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        !self.streaming
    }
}

/// Transient per-exchange state.
#[derive(Debug, Default)]
struct StreamState {
    buffer: String,
    complete: bool,
    error: Option<TransportError>,
}

/// Step-wise assembler for callers that feed fragments by hand.
#[derive(Debug)]
pub struct StreamAssembler {
    target: MessageId,
    state: StreamState,
}

impl StreamAssembler {
    pub fn new(target: MessageId) -> Self {
        Self {
            target,
            state: StreamState::default(),
        }
    }

    pub fn target(&self) -> MessageId {
        self.target
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.state.buffer
    }

    pub fn is_complete(&self) -> bool {
        self.state.complete
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.state.error.as_ref()
    }

    /// Append a fragment and snapshot the buffer.
    pub fn push(&mut self, fragment: &str) -> Snapshot {
        self.state.buffer.push_str(fragment);
        Snapshot {
            target: self.target,
            text: self.state.buffer.clone(),
            streaming: true,
            failure: None,
        }
    }

    /// Mark the exchange complete and return the final snapshot.
    pub fn finish(&mut self) -> Snapshot {
        self.state.complete = true;
        tracing::debug!(
            target_id = %self.target,
            len = self.state.buffer.len(),
            "answer stream complete"
        );
        Snapshot {
            target: self.target,
            text: self.state.buffer.clone(),
            streaming: false,
            failure: None,
        }
    }

    /// Mark the exchange failed and return the terminal failure snapshot.
    pub fn fail(&mut self, err: TransportError) -> Snapshot {
        tracing::warn!(target_id = %self.target, error = %err, "answer stream failed");
        let failure = err.to_string();
        self.state.complete = true;
        self.state.buffer.clear();
        self.state.error = Some(err);
        Snapshot {
            target: self.target,
            text: FALLBACK_MESSAGE.to_string(),
            streaming: false,
            failure: Some(failure),
        }
    }
}

/// Assemble the snapshots of one exchange.
///
/// `opened` is the result of opening the exchange's stream. The returned
/// stream always ends with exactly one terminal snapshot (`streaming ==
/// false`).
pub fn assemble(
    target: MessageId,
    opened: Result<FragmentStream, TransportError>,
) -> BoxStream<'static, Snapshot> {
    let fragments = match opened {
        Ok(fragments) => fragments,
        Err(err) => {
            let snapshot = StreamAssembler::new(target).fail(err);
            return stream::iter(std::iter::once(snapshot)).boxed();
        }
    };

    stream::unfold(
        Some((fragments, StreamAssembler::new(target))),
        |state| async move {
            let (mut fragments, mut assembler) = state?;
            match fragments.next().await {
                Some(Ok(fragment)) => {
                    let snapshot = assembler.push(&fragment);
                    Some((snapshot, Some((fragments, assembler))))
                }
                Some(Err(err)) => Some((assembler.fail(err), None)),
                None => Some((assembler.finish(), None)),
            }
        },
    )
    .boxed()
}
