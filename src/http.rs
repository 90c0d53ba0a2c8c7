//! HTTP implementation of [`Transport`].
//!
//! Talks to the question-answering service over its JSON/multipart API.
//! Answers arrive as a chunked `text/plain` body; [`Utf8Decoder`] turns the
//! byte chunks into text fragments without splitting multi-byte characters.
//!
//! # Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `POST`   | `/ask/` | [`submit_question`](Transport::submit_question) |
//! | `GET`    | `/files/` | [`list_inventory`](Transport::list_inventory) |
//! | `DELETE` | `/delete/{name}` | [`delete_inventory_entry`](Transport::delete_inventory_entry) |
//! | `DELETE` | `/clear-all/` | [`clear_inventory`](Transport::clear_inventory) |
//! | `POST`   | `/new-session/` | [`start_new_session`](Transport::start_new_session) |
//! | `POST`   | `/upload/` | [`upload_documents`](Transport::upload_documents) |
//! | `POST`   | `/scrape/` | [`ingest_url`](Transport::ingest_url) |
//! | `GET`    | `/web-sources/` | [`list_web_sources`](Transport::list_web_sources) |
//!
//! Error bodies are `{"detail": "..."}`; anything else falls back to the
//! generic status message.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use docqa_core::models::{
    Confirmation, IngestReport, Inventory, InventoryEntry, QuestionRequest, UploadFile,
    UploadReport, WebSource,
};
use docqa_core::transport::{FragmentStream, Transport};
use docqa_core::{Session, TransportError};

use crate::config::{Config, ServiceConfig};

pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.url()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL. Segments are percent-encoded, so
    /// a file name can never escape its path position.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::Rejected(format!("Cannot build a path on {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Build a [`Session`] talking to the configured service.
pub fn open_session(config: &Config) -> Result<Session> {
    let transport = HttpTransport::new(&config.service)?;
    tracing::debug!(base_url = %transport.base_url(), "opening session");
    Ok(Session::new(Arc::new(transport)))
}

fn network(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

/// Pass success responses through; turn anything else into
/// [`TransportError::Status`] with the server's `detail` when present.
async fn check(resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(
        status = status.as_u16(),
        body = %body.chars().take(500).collect::<String>(),
        "service error"
    );
    Err(TransportError::status(status.as_u16(), error_detail(&body)))
}

pub(crate) fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        // FastAPI-style validation errors arrive as arrays.
        other => Some(other.to_string()),
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, TransportError> {
    let bytes = resp.bytes().await.map_err(network)?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Mutate endpoints may answer with JSON, plain text, or nothing at all.
async fn confirmation(resp: Response) -> Result<Confirmation, TransportError> {
    let body = resp.text().await.map_err(network)?;
    Ok(parse_confirmation(&body))
}

pub(crate) fn parse_confirmation(body: &str) -> Confirmation {
    let body = body.trim();
    if body.is_empty() {
        return Confirmation::default();
    }
    serde_json::from_str(body).unwrap_or_else(|_| Confirmation {
        message: Some(body.to_string()),
    })
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    total_chunks: u64,
    #[serde(default)]
    file_details: Vec<FileDetail>,
}

#[derive(Debug, Deserialize)]
struct FileDetail {
    filename: String,
    #[serde(default)]
    chunk_count: u64,
    #[serde(default)]
    sample_text: Option<String>,
}

impl FilesResponse {
    fn into_inventory(self) -> Inventory {
        let inventory = if self.file_details.is_empty() {
            Inventory::from_entries(self.files.into_iter().map(|f| InventoryEntry::new(f, 0)))
        } else {
            Inventory::from_entries(self.file_details.into_iter().map(|d| InventoryEntry {
                name: d.filename,
                chunk_count: d.chunk_count,
                sample_text: d.sample_text,
            }))
        };
        if inventory.chunk_total() != self.total_chunks {
            tracing::warn!(
                reported = self.total_chunks,
                summed = inventory.chunk_total(),
                "service chunk total disagrees with its per-file counts"
            );
        }
        inventory
    }
}

#[derive(Debug, Deserialize)]
struct WebSourcesResponse {
    #[serde(default)]
    sources: Vec<WebSource>,
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit_question(
        &self,
        request: &QuestionRequest,
    ) -> Result<FragmentStream, TransportError> {
        let url = self.endpoint(&["ask", ""])?;
        let resp = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(network)?;
        let resp = check(resp).await?;
        Ok(fragments(resp))
    }

    async fn list_inventory(&self) -> Result<Inventory, TransportError> {
        let url = self.endpoint(&["files", ""])?;
        let resp = self.client.get(url).send().await.map_err(network)?;
        let files: FilesResponse = decode(check(resp).await?).await?;
        Ok(files.into_inventory())
    }

    async fn delete_inventory_entry(&self, name: &str) -> Result<Confirmation, TransportError> {
        let url = self.endpoint(&["delete", name])?;
        let resp = self.client.delete(url).send().await.map_err(network)?;
        confirmation(check(resp).await?).await
    }

    async fn clear_inventory(&self) -> Result<Confirmation, TransportError> {
        let url = self.endpoint(&["clear-all", ""])?;
        let resp = self.client.delete(url).send().await.map_err(network)?;
        confirmation(check(resp).await?).await
    }

    async fn start_new_session(&self) -> Result<Confirmation, TransportError> {
        let url = self.endpoint(&["new-session", ""])?;
        let resp = self.client.post(url).send().await.map_err(network)?;
        confirmation(check(resp).await?).await
    }

    async fn upload_documents(
        &self,
        files: Vec<UploadFile>,
    ) -> Result<UploadReport, TransportError> {
        let url = self.endpoint(&["upload", ""])?;
        let form = files.into_iter().fold(Form::new(), |form, file| {
            form.part("files", Part::bytes(file.bytes).file_name(file.file_name))
        });
        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        decode(check(resp).await?).await
    }

    async fn ingest_url(&self, url: &str) -> Result<IngestReport, TransportError> {
        let endpoint = self.endpoint(&["scrape", ""])?;
        let resp = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(network)?;
        decode(check(resp).await?).await
    }

    async fn list_web_sources(&self) -> Result<Vec<WebSource>, TransportError> {
        let url = self.endpoint(&["web-sources", ""])?;
        let resp = self.client.get(url).send().await.map_err(network)?;
        let body: WebSourcesResponse = decode(check(resp).await?).await?;
        Ok(body.sources)
    }
}

/// Turn a streaming response body into text fragments.
fn fragments(resp: Response) -> FragmentStream {
    let body = resp.bytes_stream().boxed();
    stream::unfold(
        (body, Utf8Decoder::default(), false),
        |(mut body, mut decoder, done)| async move {
            if done {
                return None;
            }
            loop {
                match body.next().await {
                    Some(Ok(bytes)) => {
                        let text = decoder.push(&bytes);
                        if !text.is_empty() {
                            return Some((Ok(text), (body, decoder, false)));
                        }
                    }
                    Some(Err(e)) => {
                        let err = TransportError::Interrupted(e.to_string());
                        return Some((Err(err), (body, decoder, true)));
                    }
                    None => {
                        let tail = decoder.finish();
                        if tail.is_empty() {
                            return None;
                        }
                        return Some((Ok(tail), (body, decoder, true)));
                    }
                }
            }
        },
    )
    .boxed()
}

/// Incremental UTF-8 decoder.
///
/// Holds back an incomplete trailing sequence until the next chunk completes
/// it. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is still held back at end of stream.
    pub(crate) fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
