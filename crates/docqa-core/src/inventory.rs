//! Optimistic inventory synchronizer.
//!
//! [`InventorySync`] owns the single live [`Inventory`] of a session and keeps
//! it consistent with the remote store.
//!
//! # Operations
//!
//! | Operation | Remote call | Local effect on success | On failure |
//! |-----------|-------------|-------------------------|------------|
//! | [`refresh`](InventorySync::refresh) | list | replace wholesale | keep prior, set error |
//! | [`delete_entry`](InventorySync::delete_entry) | delete, then list | remove entry, then best-effort replace | keep prior, set error |
//! | [`clear_all`](InventorySync::clear_all) | clear | canonical empty inventory | keep prior, set error |
//! | [`upload`](InventorySync::upload) | upload, then list | best-effort replace | keep prior, set error |
//!
//! Local state only changes after the remote store confirmed the mutation, so
//! no rollback path exists. A mutate that applied its change before
//! confirmation would need a compensating rollback.
//!
//! Calls are serialized by an internal async mutex; `busy` is set for the
//! whole duration of each call, including the nested refresh, and is
//! cleared on every exit path.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use futures::lock::Mutex as AsyncMutex;

use crate::error::TransportError;
use crate::models::{Inventory, UploadFile, UploadReport};
use crate::transport::Transport;

/// Maximum number of documents the service accepts.
pub const MAX_DOCUMENTS: usize = 3;

/// Read-only copy of the synchronizer state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryView {
    pub inventory: Inventory,
    pub busy: bool,
    pub error: Option<String>,
    /// Non-fatal problems from the last operation, such as a failed refresh
    /// after a confirmed delete.
    pub warnings: Vec<String>,
}

#[derive(Default)]
struct SyncState {
    inventory: Inventory,
    busy: bool,
    error: Option<String>,
    warnings: Vec<String>,
}

/// Sets `busy` on creation and clears it on drop.
struct BusyGuard<'a> {
    state: &'a RwLock<SyncState>,
}

impl<'a> BusyGuard<'a> {
    fn begin(state: &'a RwLock<SyncState>) -> Self {
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

pub struct InventorySync {
    transport: Arc<dyn Transport>,
    state: RwLock<SyncState>,
    op_lock: AsyncMutex<()>,
}

impl InventorySync {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: RwLock::new(SyncState::default()),
            op_lock: AsyncMutex::new(()),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, SyncState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> InventoryView {
        let s = self.state.read().unwrap_or_else(PoisonError::into_inner);
        InventoryView {
            inventory: s.inventory.clone(),
            busy: s.busy,
            error: s.error.clone(),
            warnings: s.warnings.clone(),
        }
    }

    /// Snapshot of the current inventory.
    pub fn inventory(&self) -> Inventory {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .inventory
            .clone()
    }

    fn fail(&self, op: &str, err: TransportError) -> TransportError {
        tracing::warn!(op, error = %err, "inventory operation failed");
        self.write().error = Some(err.to_string());
        err
    }

    /// Fetch the remote inventory and replace the local copy. Does not touch
    /// `busy` or `error`.
    async fn fetch_and_replace(&self) -> Result<(), TransportError> {
        let fresh = self.transport.list_inventory().await?;
        self.write().inventory = fresh;
        Ok(())
    }

    /// Best-effort correction after a confirmed mutate. Failure becomes a
    /// warning.
    async fn corroborate(&self, op: &str) {
        if let Err(err) = self.fetch_and_replace().await {
            tracing::warn!(
                op,
                error = %err,
                "refresh after confirmed mutation failed; keeping local state"
            );
            self.write()
                .warnings
                .push(format!("Could not refresh document list: {}", err));
        }
    }

    /// Replace the local inventory with the remote one.
    pub async fn refresh(&self) -> Result<(), TransportError> {
        let _serial = self.op_lock.lock().await;
        let _busy = BusyGuard::begin(&self.state);
        tracing::debug!("refreshing inventory");
        self.fetch_and_replace()
            .await
            .map_err(|e| self.fail("refresh", e))
    }

    /// Delete one entry.
    ///
    /// The result reflects only the remote delete. After it succeeds the
    /// entry is removed locally and a refresh runs; if that refresh fails the
    /// local state stays authoritative and the failure is recorded in
    /// [`InventoryView::warnings`].
    pub async fn delete_entry(&self, name: &str) -> Result<(), TransportError> {
        let _serial = self.op_lock.lock().await;
        let _busy = BusyGuard::begin(&self.state);
        tracing::debug!(name, "deleting inventory entry");

        self.transport
            .delete_inventory_entry(name)
            .await
            .map_err(|e| self.fail("delete", e))?;

        if self.write().inventory.remove_entry(name).is_none() {
            tracing::debug!(name, "deleted entry was not in the local inventory");
        }
        self.corroborate("delete").await;
        Ok(())
    }

    /// Delete every entry. On success the local inventory becomes
    /// [`Inventory::empty`] without a refresh round-trip.
    pub async fn clear_all(&self) -> Result<(), TransportError> {
        let _serial = self.op_lock.lock().await;
        let _busy = BusyGuard::begin(&self.state);
        tracing::debug!("clearing inventory");

        self.transport
            .clear_inventory()
            .await
            .map_err(|e| self.fail("clear", e))?;
        self.write().inventory = Inventory::empty();
        Ok(())
    }

    /// Upload documents, then refresh best-effort.
    ///
    /// Batches that would exceed [`MAX_DOCUMENTS`] are refused locally.
    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadReport, TransportError> {
        let _serial = self.op_lock.lock().await;
        let _busy = BusyGuard::begin(&self.state);

        let (current, fresh) = {
            let s = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let fresh = files
                .iter()
                .filter(|f| s.inventory.get(&f.file_name).is_none())
                .count();
            (s.inventory.entry_count() as usize, fresh)
        };
        if current + fresh > MAX_DOCUMENTS {
            let err = TransportError::Rejected(format!(
                "Maximum {} files allowed. You currently have {} files. You can upload {} more files.",
                MAX_DOCUMENTS,
                current,
                MAX_DOCUMENTS.saturating_sub(current)
            ));
            return Err(self.fail("upload", err));
        }

        tracing::debug!(count = files.len(), "uploading documents");
        let report = self
            .transport
            .upload_documents(files)
            .await
            .map_err(|e| self.fail("upload", e))?;
        self.corroborate("upload").await;
        Ok(report)
    }
}
