//! Session transcript: the ordered list of conversation messages.
//!
//! The transcript owns message identity. Ids come from a monotonic counter
//! that survives [`reset`](Transcript::reset), so an id never names two
//! different messages and a stale exchange can always be recognized.
//!
//! At most one message is flagged `streaming` at any time: appending a new
//! pair finalizes any message still streaming, which turns the previous
//! exchange's remaining snapshots into no-ops.
//!
//! Mutations publish a [`TranscriptEvent`] to every subscriber before the
//! call returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::models::{Message, MessageId, Role};

/// Result of [`Transcript::update_streaming`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Applied,
    /// No message has this id (never existed, or removed by a reset).
    UnknownMessage,
    /// The message exists but is no longer streaming.
    NotStreaming,
}

impl UpdateStatus {
    pub fn is_applied(self) -> bool {
        matches!(self, UpdateStatus::Applied)
    }
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Appended {
        user: MessageId,
        assistant: MessageId,
    },
    Updated {
        id: MessageId,
        streaming: bool,
    },
    Error(Option<String>),
    Reset,
}

/// Read-only copy of the transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptView {
    pub messages: Vec<Message>,
    pub error: Option<String>,
}

impl TranscriptView {
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.streaming)
    }
}

#[derive(Default)]
struct TranscriptState {
    messages: Vec<Message>,
    error: Option<String>,
}

pub struct Transcript {
    state: RwLock<TranscriptState>,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<UnboundedSender<TranscriptEvent>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TranscriptState::default()),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TranscriptState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TranscriptState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn publish(&self, event: TranscriptEvent) {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    /// Receive every subsequent change. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> UnboundedReceiver<TranscriptEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Append a user message and an empty streaming assistant placeholder.
    ///
    /// Returns the placeholder's id, which the exchange's snapshots target.
    pub fn append(&self, question: &str) -> MessageId {
        let user = self.issue_id();
        let assistant = self.issue_id();
        let now = Utc::now();
        {
            let mut state = self.write();
            for m in state.messages.iter_mut().filter(|m| m.streaming) {
                tracing::debug!(id = %m.id, "finalizing superseded streaming message");
                m.streaming = false;
            }
            state.messages.push(Message {
                id: user,
                role: Role::User,
                content: question.to_string(),
                created_at: now,
                streaming: false,
            });
            state.messages.push(Message {
                id: assistant,
                role: Role::Assistant,
                content: String::new(),
                created_at: now,
                streaming: true,
            });
        }
        self.publish(TranscriptEvent::Appended { user, assistant });
        assistant
    }

    /// Replace the content and streaming flag of a streaming message.
    ///
    /// Updates addressed to an unknown or finalized message are ignored and
    /// reported through the returned status.
    pub fn update_streaming(
        &self,
        id: MessageId,
        content: &str,
        still_streaming: bool,
    ) -> UpdateStatus {
        let status = {
            let mut state = self.write();
            match state.messages.iter_mut().find(|m| m.id == id) {
                None => UpdateStatus::UnknownMessage,
                Some(m) if !m.streaming => UpdateStatus::NotStreaming,
                Some(m) => {
                    m.content.clear();
                    m.content.push_str(content);
                    m.streaming = still_streaming;
                    UpdateStatus::Applied
                }
            }
        };
        match status {
            UpdateStatus::Applied => self.publish(TranscriptEvent::Updated {
                id,
                streaming: still_streaming,
            }),
            rejected => tracing::debug!(%id, ?rejected, "dropped stale snapshot"),
        }
        status
    }

    pub fn set_error(&self, error: Option<String>) {
        self.write().error = error.clone();
        self.publish(TranscriptEvent::Error(error));
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    /// Drop every message and the error state.
    pub fn reset(&self) {
        {
            let mut state = self.write();
            state.messages.clear();
            state.error = None;
        }
        self.publish(TranscriptEvent::Reset);
    }

    pub fn len(&self) -> usize {
        self.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.read().messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn view(&self) -> TranscriptView {
        let state = self.read();
        TranscriptView {
            messages: state.messages.clone(),
            error: state.error.clone(),
        }
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::StreamAssembler;

    #[test]
    fn test_append_creates_pair_in_order() {
        let t = Transcript::new();
        let id = t.append("What is in the report?");
        let view = t.view();
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].role, Role::User);
        assert_eq!(view.messages[0].content, "What is in the report?");
        assert!(!view.messages[0].streaming);
        assert_eq!(view.messages[1].id, id);
        assert_eq!(view.messages[1].role, Role::Assistant);
        assert_eq!(view.messages[1].content, "");
        assert!(view.messages[1].streaming);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let t = Transcript::new();
        t.append("q");
        let before = t.view();
        assert_eq!(
            t.update_streaming(MessageId(999), "x", true),
            UpdateStatus::UnknownMessage
        );
        assert_eq!(t.view(), before);
    }

    #[test]
    fn test_finalized_message_is_immutable() {
        let t = Transcript::new();
        let id = t.append("q");
        assert!(t.update_streaming(id, "done", false).is_applied());
        assert_eq!(
            t.update_streaming(id, "late", true),
            UpdateStatus::NotStreaming
        );
        assert_eq!(t.get(id).unwrap().content, "done");
    }

    #[test]
    fn test_at_most_one_streaming() {
        let t = Transcript::new();
        let first = t.append("one");
        let second = t.append("two");
        let view = t.view();
        assert_eq!(view.messages.iter().filter(|m| m.streaming).count(), 1);
        assert!(!view.get(first).unwrap().streaming);
        assert_eq!(view.streaming_message().unwrap().id, second);
    }

    #[test]
    fn test_stale_exchange_cannot_overwrite_newer() {
        let t = Transcript::new();
        let old = t.append("first");
        let mut old_asm = StreamAssembler::new(old);
        let s = old_asm.push("old-1");
        assert!(t.update_streaming(s.target, &s.text, s.streaming).is_applied());

        let new = t.append("second");
        let mut new_asm = StreamAssembler::new(new);
        let s = new_asm.push("new-1");
        assert!(t.update_streaming(s.target, &s.text, s.streaming).is_applied());

        let late = old_asm.push("old-2");
        assert_eq!(
            t.update_streaming(late.target, &late.text, late.streaming),
            UpdateStatus::NotStreaming
        );
        assert_eq!(t.get(new).unwrap().content, "new-1");
        assert_eq!(t.get(old).unwrap().content, "old-1");
    }

    #[test]
    fn test_ids_not_reused_after_reset() {
        let t = Transcript::new();
        let before = t.append("q");
        t.reset();
        let after = t.append("q");
        assert!(after > before);
        assert_eq!(
            t.update_streaming(before, "stale", false),
            UpdateStatus::UnknownMessage
        );
        assert_eq!(t.get(after).unwrap().content, "");
    }

    #[test]
    fn test_reset_clears_messages_and_error() {
        let t = Transcript::new();
        t.append("q");
        t.set_error(Some("boom".into()));
        t.reset();
        assert!(t.is_empty());
        assert!(t.error().is_none());
        t.reset();
        assert!(t.is_empty());
    }

    #[test]
    fn test_subscribers_see_mutations_synchronously() {
        let t = Transcript::new();
        let mut rx = t.subscribe();
        let id = t.append("q");
        t.update_streaming(id, "a", true);
        t.update_streaming(MessageId(12345), "x", true);
        t.reset();

        let mut events = Vec::new();
        while let Ok(Some(e)) = rx.try_next() {
            events.push(e);
        }
        assert_eq!(
            events,
            vec![
                TranscriptEvent::Appended {
                    user: MessageId(id.0 - 1),
                    assistant: id
                },
                TranscriptEvent::Updated {
                    id,
                    streaming: true
                },
                TranscriptEvent::Reset,
            ]
        );
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let t = Transcript::new();
        drop(t.subscribe());
        t.append("q");
        assert!(t.subscribers.lock().unwrap().is_empty());
    }
}
