//! `docqa ingest`: submit a web page for indexing.

use anyhow::Result;

use crate::config::Config;
use crate::http::open_session;

pub async fn run_ingest(config: &Config, url: &str) -> Result<()> {
    let session = open_session(config)?;
    let report = session.web_sources().ingest(url).await?;

    if report.message.is_empty() {
        println!("Ingested {}.", url.trim());
    } else {
        println!("{}", report.message);
    }
    println!("  Chunks: {}", report.chunks);

    let view = session.web_sources().view();
    for w in &view.warnings {
        eprintln!("Warning: {}", w);
    }
    println!("  Web sources: {}", view.sources.len());
    Ok(())
}
