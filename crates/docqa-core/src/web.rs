//! Ingested web pages.
//!
//! A read-only mirror of the service's web-source collection. Its only job in
//! the core is to feed [`gating`](crate::gating) and to let the user submit a
//! new page; the service owns the data.

use std::sync::{Arc, PoisonError, RwLock};

use futures::lock::Mutex as AsyncMutex;

use crate::error::TransportError;
use crate::models::{IngestReport, WebSource};
use crate::transport::Transport;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebSourcesView {
    pub sources: Vec<WebSource>,
    pub busy: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

pub struct WebSources {
    transport: Arc<dyn Transport>,
    state: RwLock<WebSourcesView>,
    op_lock: AsyncMutex<()>,
}

/// Sets `busy` on creation and clears it on drop.
struct BusyGuard<'a> {
    state: &'a RwLock<WebSourcesView>,
}

impl<'a> BusyGuard<'a> {
    fn begin(state: &'a RwLock<WebSourcesView>) -> Self {
        let mut s = state.write().unwrap_or_else(PoisonError::into_inner);
        s.busy = true;
        s.error = None;
        s.warnings.clear();
        Self { state }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .busy = false;
    }
}

/// Accepts `http://` and `https://` URLs with a host.
pub fn is_valid_url(url: &str) -> bool {
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    !host.is_empty() && !host.chars().any(char::is_whitespace)
}

impl WebSources {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: RwLock::new(WebSourcesView::default()),
            op_lock: AsyncMutex::new(()),
        }
    }

    pub fn view(&self) -> WebSourcesView {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sources
            .len()
    }

    fn update(&self, f: impl FnOnce(&mut WebSourcesView)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }

    fn fail(&self, err: TransportError) -> TransportError {
        self.update(|s| s.error = Some(err.to_string()));
        err
    }

    /// Replace the local list with the remote one. A failure keeps the prior
    /// list and records the error.
    pub async fn refresh(&self) -> Result<(), TransportError> {
        let _serial = self.op_lock.lock().await;
        let _busy = BusyGuard::begin(&self.state);
        match self.transport.list_web_sources().await {
            Ok(sources) => {
                self.update(|s| s.sources = sources);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "listing web sources failed");
                Err(self.fail(e))
            }
        }
    }

    /// Submit a page for ingestion, then refresh the list best-effort.
    pub async fn ingest(&self, url: &str) -> Result<IngestReport, TransportError> {
        let _serial = self.op_lock.lock().await;
        let _busy = BusyGuard::begin(&self.state);
        let url = url.trim();
        if !is_valid_url(url) {
            return Err(self.fail(TransportError::Rejected(format!("Invalid URL: {}", url))));
        }

        let report = match self.transport.ingest_url(url).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(url, error = %e, "web ingest failed");
                return Err(self.fail(e));
            }
        };

        match self.transport.list_web_sources().await {
            Ok(sources) => self.update(|s| s.sources = sources),
            Err(e) => {
                tracing::warn!(error = %e, "refresh after ingest failed");
                self.update(|s| {
                    if !s.sources.iter().any(|w| w.url == url) {
                        s.sources.push(WebSource {
                            url: url.to_string(),
                            chunk_count: report.chunks,
                        });
                    }
                    s.warnings
                        .push(format!("Could not refresh web sources: {}", e));
                });
            }
        }
        Ok(report)
    }
}
