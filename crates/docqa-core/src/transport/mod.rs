//! Transport abstraction for the question-answering service.
//!
//! The [`Transport`] trait is the boundary between the core and the network.
//! Every operation is a single attempt; retries are left to the user.
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::models::{
    Confirmation, IngestReport, Inventory, QuestionRequest, UploadFile, UploadReport, WebSource,
};

/// Lazy, non-restartable sequence of answer fragments from one exchange.
///
/// An `Err` item means the read failed after the stream began.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

/// Abstract client for the question-answering service.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`submit_question`](Transport::submit_question) | Ask a question, get a fragment stream |
/// | [`list_inventory`](Transport::list_inventory) | Fetch the authoritative inventory |
/// | [`delete_inventory_entry`](Transport::delete_inventory_entry) | Delete one document |
/// | [`clear_inventory`](Transport::clear_inventory) | Delete every document |
/// | [`start_new_session`](Transport::start_new_session) | Drop the service-side conversation context |
/// | [`upload_documents`](Transport::upload_documents) | Upload documents for indexing |
/// | [`ingest_url`](Transport::ingest_url) | Scrape and index a web page |
/// | [`list_web_sources`](Transport::list_web_sources) | List ingested web pages |
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a question. A non-success status must be reported here, before
    /// any fragment is produced.
    async fn submit_question(
        &self,
        request: &QuestionRequest,
    ) -> Result<FragmentStream, TransportError>;

    async fn list_inventory(&self) -> Result<Inventory, TransportError>;

    /// Delete one entry. A missing or empty response body counts as success.
    async fn delete_inventory_entry(&self, name: &str) -> Result<Confirmation, TransportError>;

    async fn clear_inventory(&self) -> Result<Confirmation, TransportError>;

    async fn start_new_session(&self) -> Result<Confirmation, TransportError>;

    async fn upload_documents(&self, files: Vec<UploadFile>)
        -> Result<UploadReport, TransportError>;

    async fn ingest_url(&self, url: &str) -> Result<IngestReport, TransportError>;

    async fn list_web_sources(&self) -> Result<Vec<WebSource>, TransportError>;
}
