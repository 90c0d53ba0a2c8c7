//! Document inventory commands: `files`, `delete`, `clear`, `upload` and
//! `new-session`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use docqa_core::models::{Inventory, UploadFile, UploadReport, WebSource};
use docqa_core::Session;

use crate::config::Config;
use crate::http::open_session;

const SAMPLE_WIDTH: usize = 48;

/// Print the inventory as a table with totals.
pub fn print_inventory(inventory: &Inventory) {
    println!(
        "  Documents:   {}   Chunks: {}",
        inventory.entry_count(),
        inventory.chunk_total()
    );
    if inventory.is_empty() {
        println!("  (no documents uploaded)");
        return;
    }
    println!();
    println!("  {:<32} {:>8}   {}", "NAME", "CHUNKS", "SAMPLE");
    println!("  {}", "-".repeat(32 + 1 + 8 + 3 + SAMPLE_WIDTH));
    for entry in inventory.entries() {
        let sample = entry
            .sample_text
            .as_deref()
            .map(one_line_preview)
            .unwrap_or_default();
        println!("  {:<32} {:>8}   {}", entry.name, entry.chunk_count, sample);
    }
}

fn print_web_sources(sources: &[WebSource]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("  Web sources: {}", sources.len());
    println!("  {:<60} {:>8}", "URL", "CHUNKS");
    println!("  {}", "-".repeat(69));
    for s in sources {
        println!("  {:<60} {:>8}", s.url, s.chunk_count);
    }
}

/// Collapse whitespace and cut to [`SAMPLE_WIDTH`] characters.
fn one_line_preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SAMPLE_WIDTH {
        return flat;
    }
    let mut cut: String = flat.chars().take(SAMPLE_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}

fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("Warning: {}", w);
    }
}

pub async fn run_files(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    session.inventory().refresh().await?;
    if let Err(e) = session.web_sources().refresh().await {
        eprintln!("Warning: could not load web sources: {}", e);
    }

    println!("docqa: Documents");
    println!("================");
    println!();
    print_inventory(&session.inventory().inventory());
    print_web_sources(&session.web_sources().view().sources);
    println!();
    Ok(())
}

pub async fn run_delete(config: &Config, name: &str) -> Result<()> {
    let session = open_session(config)?;
    session.inventory().delete_entry(name).await?;

    let view = session.inventory().view();
    println!("Deleted {}.", name);
    if view.warnings.is_empty() {
        println!("{} document(s) remaining.", view.inventory.entry_count());
    }
    print_warnings(&view.warnings);
    Ok(())
}

pub async fn run_clear(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    session.inventory().clear_all().await?;
    println!("All documents cleared.");
    Ok(())
}

pub async fn run_new_session(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    session.reset_session().await?;
    println!("Started a new session.");
    Ok(())
}

async fn read_upload(path: &Path) -> Result<UploadFile> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file path: {}", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(UploadFile { file_name, bytes })
}

pub async fn run_upload(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_upload(path).await?);
    }

    let session = open_session(config)?;
    upload_with(&session, files).await
}

async fn upload_with(session: &Session, files: Vec<UploadFile>) -> Result<()> {
    // The document limit is checked against the service's current inventory.
    session.inventory().refresh().await?;
    let report = session.inventory().upload(files).await?;
    print_upload_report(&report);
    print_warnings(&session.inventory().view().warnings);
    Ok(())
}

fn print_upload_report(report: &UploadReport) {
    if !report.message.is_empty() {
        println!("{}", report.message);
    }
    let lists = [
        ("Accepted", &report.healthcare_files),
        ("Rejected (not healthcare-related)", &report.rejected_files),
        ("Skipped (already uploaded)", &report.skipped_files),
    ];
    for (label, names) in lists {
        if !names.is_empty() {
            println!("  {}: {}", label, names.join(", "));
        }
    }
    println!("  Total chunks: {}", report.total_chunks);
}
