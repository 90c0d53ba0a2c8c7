//! Submission gating.
//!
//! A question may be sent when the override (entertainment) mode is on, or
//! when at least one document or ingested web page is available.

use crate::models::Inventory;

/// Shown when submission is blocked.
pub const NO_SOURCES_WARNING: &str =
    "Upload a document or ingest a web page before asking a question, or switch on entertainment mode.";

pub fn can_submit(
    inventory: &Inventory,
    external_source_count: usize,
    override_mode: bool,
) -> bool {
    override_mode || inventory.entry_count() > 0 || external_source_count > 0
}

/// The warning to display, or `None` when submission is allowed.
pub fn submit_warning(
    inventory: &Inventory,
    external_source_count: usize,
    override_mode: bool,
) -> Option<&'static str> {
    if can_submit(inventory, external_source_count, override_mode) {
        None
    } else {
        Some(NO_SOURCES_WARNING)
    }
}
