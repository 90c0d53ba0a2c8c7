//! Session orchestration.
//!
//! A [`Session`] owns one [`Transcript`], one [`InventorySync`] and one
//! [`WebSources`], all built over the same [`Transport`]. It is the surface
//! a UI layer talks to: `send_question`, `reset_session`, and read access to
//! each component's view.

use std::sync::Arc;

use futures::StreamExt;

use crate::assembler::{assemble, Snapshot};
use crate::error::{SessionError, TransportError};
use crate::gating;
use crate::inventory::InventorySync;
use crate::models::{MessageId, QuestionRequest};
use crate::transcript::Transcript;
use crate::transport::Transport;
use crate::web::WebSources;

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed { message_id: MessageId, text: String },
    /// The assistant message now holds the fallback text; `error` is the
    /// user-visible reason.
    Failed { message_id: MessageId, error: String },
    /// A newer exchange or a reset took over the target message; the rest of
    /// the stream was dropped.
    Superseded { message_id: MessageId },
}

impl ExchangeOutcome {
    pub fn message_id(&self) -> MessageId {
        match self {
            ExchangeOutcome::Completed { message_id, .. }
            | ExchangeOutcome::Failed { message_id, .. }
            | ExchangeOutcome::Superseded { message_id } => *message_id,
        }
    }
}

pub struct Session {
    transport: Arc<dyn Transport>,
    transcript: Transcript,
    inventory: InventorySync,
    web: WebSources,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transcript: Transcript::new(),
            inventory: InventorySync::new(transport.clone()),
            web: WebSources::new(transport.clone()),
            transport,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn inventory(&self) -> &InventorySync {
        &self.inventory
    }

    pub fn web_sources(&self) -> &WebSources {
        &self.web
    }

    pub fn can_submit(&self, override_mode: bool) -> bool {
        gating::can_submit(&self.inventory.inventory(), self.web.count(), override_mode)
    }

    pub fn submit_warning(&self, override_mode: bool) -> Option<&'static str> {
        gating::submit_warning(&self.inventory.inventory(), self.web.count(), override_mode)
    }

    /// Ask a question and stream the answer into the transcript.
    pub async fn send_question(
        &self,
        text: &str,
        override_mode: bool,
    ) -> Result<ExchangeOutcome, SessionError> {
        self.send_question_with(text, override_mode, |_| {}).await
    }

    /// Like [`send_question`](Session::send_question), handing every applied
    /// snapshot to `on_snapshot` as it arrives.
    ///
    /// Transport and stream failures end the exchange with
    /// [`ExchangeOutcome::Failed`]; only precondition refusals are `Err`.
    pub async fn send_question_with<F>(
        &self,
        text: &str,
        override_mode: bool,
        mut on_snapshot: F,
    ) -> Result<ExchangeOutcome, SessionError>
    where
        F: FnMut(&Snapshot),
    {
        let question = text.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if !self.can_submit(override_mode) {
            return Err(SessionError::NoSources);
        }

        self.transcript.set_error(None);
        let message_id = self.transcript.append(question);
        tracing::debug!(%message_id, entertainment = override_mode, "submitting question");

        let request = QuestionRequest {
            question: question.to_string(),
            entertainment: override_mode,
        };
        let opened = self.transport.submit_question(&request).await;
        let mut snapshots = assemble(message_id, opened);

        while let Some(snapshot) = snapshots.next().await {
            let status =
                self.transcript
                    .update_streaming(snapshot.target, &snapshot.text, snapshot.streaming);
            if !status.is_applied() {
                tracing::debug!(%message_id, ?status, "exchange superseded, dropping stream");
                return Ok(ExchangeOutcome::Superseded { message_id });
            }
            on_snapshot(&snapshot);

            if snapshot.is_terminal() {
                return Ok(match snapshot.failure {
                    Some(error) => {
                        self.transcript.set_error(Some(error.clone()));
                        ExchangeOutcome::Failed { message_id, error }
                    }
                    None => ExchangeOutcome::Completed {
                        message_id,
                        text: snapshot.text,
                    },
                });
            }
        }

        // assemble() always ends with a terminal snapshot.
        Ok(ExchangeOutcome::Failed {
            message_id,
            error: "answer stream ended unexpectedly".to_string(),
        })
    }

    /// Start a fresh conversation on the service and clear the transcript.
    ///
    /// When the service refuses, the transcript is kept and the error is
    /// recorded on it.
    pub async fn reset_session(&self) -> Result<(), TransportError> {
        match self.transport.start_new_session().await {
            Ok(_) => {
                self.transcript.reset();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "starting a new session failed");
                self.transcript.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }
}
