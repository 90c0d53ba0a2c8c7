//! In-memory [`Transport`] implementation for tests and offline use.
//!
//! Holds the inventory and web sources behind `std::sync::RwLock`, answers
//! questions from a queue of [`ScriptedAnswer`]s and lets callers inject a
//! failure for the next call of any [`Operation`], or hold that call until
//! released. Every call is recorded when it is issued so tests can assert on
//! the exact sequence of requests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use futures::channel::oneshot;
use futures::stream::{self, StreamExt};

use crate::error::TransportError;
use crate::models::{
    Confirmation, IngestReport, Inventory, InventoryEntry, QuestionRequest, UploadFile,
    UploadReport, WebSource,
};

use super::{FragmentStream, Transport};

/// How the next question is answered.
pub enum ScriptedAnswer {
    /// Stream these fragments, then end.
    Fragments(Vec<String>),
    /// Fail before the stream starts with the given status.
    Reject { status: u16, detail: Option<String> },
    /// Stream these fragments, then fail mid-stream.
    Interrupt {
        fragments: Vec<String>,
        error: String,
    },
    /// Stream whatever the test pushes into the channel, ending when the
    /// sender is dropped.
    Channel(UnboundedReceiver<Result<String, TransportError>>),
}

impl ScriptedAnswer {
    pub fn fragments<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedAnswer::Fragments(parts.into_iter().map(Into::into).collect())
    }
}

/// Transport operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SubmitQuestion,
    ListInventory,
    DeleteEntry,
    ClearInventory,
    NewSession,
    Upload,
    IngestUrl,
    ListWebSources,
}

/// A recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SubmitQuestion(QuestionRequest),
    ListInventory,
    DeleteEntry(String),
    ClearInventory,
    NewSession,
    Upload(Vec<String>),
    IngestUrl(String),
    ListWebSources,
}

/// Scripted in-memory service.
pub struct InMemoryTransport {
    inventory: RwLock<Inventory>,
    web_sources: RwLock<Vec<WebSource>>,
    answers: Mutex<VecDeque<ScriptedAnswer>>,
    failures: Mutex<HashMap<Operation, VecDeque<TransportError>>>,
    holds: Mutex<HashMap<Operation, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<Vec<Call>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            inventory: RwLock::new(Inventory::empty()),
            web_sources: RwLock::new(Vec::new()),
            answers: Mutex::new(VecDeque::new()),
            failures: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_entries(entries: impl IntoIterator<Item = InventoryEntry>) -> Self {
        let transport = Self::new();
        transport.set_inventory(Inventory::from_entries(entries));
        transport
    }

    /// Replace the service-side inventory.
    pub fn set_inventory(&self, inventory: Inventory) {
        *self
            .inventory
            .write()
            .unwrap_or_else(PoisonError::into_inner) = inventory;
    }

    pub fn server_inventory(&self) -> Inventory {
        self.inventory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_web_sources(&self, sources: Vec<WebSource>) {
        *self
            .web_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner) = sources;
    }

    /// Queue the answer for the next question.
    pub fn push_answer(&self, answer: ScriptedAnswer) {
        lock(&self.answers).push_back(answer);
    }

    /// Make the next call of `op` fail with `err`. Failures queue up per
    /// operation and are consumed one per call.
    pub fn fail_next(&self, op: Operation, err: TransportError) {
        lock(&self.failures).entry(op).or_default().push_back(err);
    }

    /// Suspend the next call of `op` after it is recorded. The call resumes
    /// when the returned sender fires or is dropped; keep it alive to hold
    /// the call forever.
    pub fn hold_next(&self, op: Operation) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.holds).entry(op).or_default().push_back(rx);
        tx
    }

    /// All requests received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    async fn begin(&self, op: Operation, call: Call) -> Result<(), TransportError> {
        lock(&self.calls).push(call);
        let held = lock(&self.holds).get_mut(&op).and_then(VecDeque::pop_front);
        if let Some(release) = held {
            let _ = release.await;
        }
        match lock(&self.failures).get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ok_fragments(parts: Vec<String>) -> FragmentStream {
    stream::iter(parts.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn submit_question(
        &self,
        request: &QuestionRequest,
    ) -> Result<FragmentStream, TransportError> {
        self.begin(
            Operation::SubmitQuestion,
            Call::SubmitQuestion(request.clone()),
        )
        .await?;
        let scripted = lock(&self.answers).pop_front();
        match scripted {
            Some(ScriptedAnswer::Fragments(parts)) => Ok(ok_fragments(parts)),
            Some(ScriptedAnswer::Reject { status, detail }) => {
                Err(TransportError::status(status, detail))
            }
            Some(ScriptedAnswer::Interrupt { fragments, error }) => {
                let tail = stream::once(async move { Err(TransportError::Interrupted(error)) });
                Ok(ok_fragments(fragments).chain(tail).boxed())
            }
            Some(ScriptedAnswer::Channel(rx)) => Ok(rx.boxed()),
            None => Ok(ok_fragments(vec![
                "You asked: ".to_string(),
                request.question.clone(),
            ])),
        }
    }

    async fn list_inventory(&self) -> Result<Inventory, TransportError> {
        self.begin(Operation::ListInventory, Call::ListInventory).await?;
        Ok(self.server_inventory())
    }

    async fn delete_inventory_entry(&self, name: &str) -> Result<Confirmation, TransportError> {
        self.begin(Operation::DeleteEntry, Call::DeleteEntry(name.to_string())).await?;
        let mut inv = self
            .inventory
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        inv.remove_entry(name);
        Ok(Confirmation {
            message: Some(format!("{} deleted.", name)),
        })
    }

    async fn clear_inventory(&self) -> Result<Confirmation, TransportError> {
        self.begin(Operation::ClearInventory, Call::ClearInventory).await?;
        self.set_inventory(Inventory::empty());
        Ok(Confirmation {
            message: Some("All data cleared.".to_string()),
        })
    }

    async fn start_new_session(&self) -> Result<Confirmation, TransportError> {
        self.begin(Operation::NewSession, Call::NewSession).await?;
        Ok(Confirmation {
            message: Some("New session started".to_string()),
        })
    }

    async fn upload_documents(
        &self,
        files: Vec<UploadFile>,
    ) -> Result<UploadReport, TransportError> {
        let names = files.iter().map(|f| f.file_name.clone()).collect();
        self.begin(Operation::Upload, Call::Upload(names)).await?;

        let current = self.server_inventory();
        let mut entries = current.entries().to_vec();
        let mut report = UploadReport::default();
        for file in files {
            if current.get(&file.file_name).is_some() {
                report.skipped_files.push(file.file_name);
                continue;
            }
            // One chunk per started kilobyte, like a fixed-size chunker would.
            let chunks = (file.bytes.len() as u64).div_ceil(1000).max(1);
            entries.push(InventoryEntry::new(file.file_name.clone(), chunks));
            report.healthcare_files.push(file.file_name);
        }
        let updated = Inventory::from_entries(entries);
        report.total_chunks = updated.chunk_total();
        report.message = format!(
            "Successfully uploaded {} document(s)",
            report.healthcare_files.len()
        );
        self.set_inventory(updated);
        Ok(report)
    }

    async fn ingest_url(&self, url: &str) -> Result<IngestReport, TransportError> {
        self.begin(Operation::IngestUrl, Call::IngestUrl(url.to_string())).await?;
        let mut sources = self
            .web_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !sources.iter().any(|s| s.url == url) {
            sources.push(WebSource {
                url: url.to_string(),
                chunk_count: 1,
            });
        }
        Ok(IngestReport {
            message: format!("Ingested {}", url),
            chunks: 1,
        })
    }

    async fn list_web_sources(&self) -> Result<Vec<WebSource>, TransportError> {
        self.begin(Operation::ListWebSources, Call::ListWebSources).await?;
        Ok(self
            .web_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
