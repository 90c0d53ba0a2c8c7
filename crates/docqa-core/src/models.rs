//! Core data models shared by the transcript, the inventory synchronizer and
//! the transport boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a transcript message.
///
/// Issued by [`Transcript`](crate::transcript::Transcript) from a monotonic
/// counter and never reused, even after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// True while the assistant answer is still being appended.
    pub streaming: bool,
}

/// One uploaded or ingested resource known to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Filename or URL; unique within an [`Inventory`].
    pub name: String,
    /// Number of indexed chunks the service holds for this resource.
    pub chunk_count: u64,
    pub sample_text: Option<String>,
}

impl InventoryEntry {
    pub fn new(name: impl Into<String>, chunk_count: u64) -> Self {
        Self {
            name: name.into(),
            chunk_count,
            sample_text: None,
        }
    }
}

/// The local copy of the remote inventory plus its aggregates.
///
/// The aggregates are private and only maintained by the constructors and
/// [`remove_entry`](Inventory::remove_entry), so they always equal the sums
/// over `entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
    entry_count: u64,
    chunk_total: u64,
}

impl Inventory {
    /// The canonical empty inventory: no entries, zero aggregates.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            entry_count: 0,
            chunk_total: 0,
        }
    }

    /// Build an inventory from a listing, merging entries that share a name.
    ///
    /// Duplicate names are folded into the first occurrence: chunk counts are
    /// summed, saturating at `u64::MAX`, and the first non-empty sample is
    /// kept. Order of first appearance is preserved.
    pub fn from_entries(entries: impl IntoIterator<Item = InventoryEntry>) -> Self {
        let mut merged: Vec<InventoryEntry> = Vec::new();
        for entry in entries {
            match merged.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => {
                    existing.chunk_count = existing.chunk_count.saturating_add(entry.chunk_count);
                    if existing.sample_text.is_none() {
                        existing.sample_text = entry.sample_text;
                    }
                }
                None => merged.push(entry),
            }
        }
        let chunk_total = merged
            .iter()
            .map(|e| e.chunk_count)
            .fold(0, u64::saturating_add);
        Self {
            entry_count: merged.len() as u64,
            chunk_total,
            entries: merged,
        }
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn chunk_total(&self) -> u64 {
        self.chunk_total
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&InventoryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Remove the named entry and decrement the aggregates.
    ///
    /// Aggregates saturate at zero. Returns the removed entry, or `None`
    /// (and leaves everything untouched) when the name is unknown.
    pub fn remove_entry(&mut self, name: &str) -> Option<InventoryEntry> {
        let pos = self.entries.iter().position(|e| e.name == name)?;
        let removed = self.entries.remove(pos);
        self.entry_count = self.entry_count.saturating_sub(1);
        self.chunk_total = self.chunk_total.saturating_sub(removed.chunk_count);
        Some(removed)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::empty()
    }
}

/// A web page ingested by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSource {
    pub url: String,
    #[serde(default)]
    pub chunk_count: u64,
}

/// Body of a question submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionRequest {
    pub question: String,
    /// Entertainment mode; also the override flag of the gating policy.
    pub entertainment: bool,
}

/// Acknowledgement of a mutate call. The service may omit the body entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub message: Option<String>,
}

/// A document to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The service's verdict on an upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub healthcare_files: Vec<String>,
    #[serde(default)]
    pub rejected_files: Vec<String>,
    #[serde(default)]
    pub skipped_files: Vec<String>,
    #[serde(default)]
    pub total_chunks: u64,
}

/// Result of submitting a URL for ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub chunks: u64,
}
