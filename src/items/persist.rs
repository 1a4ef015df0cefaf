//! Persistence stage with compensating blob cleanup.
//!
//! A live saved item must always have a blob at its storage path. When
//! the record write fails after a successful upload, the blob is deleted
//! before the error surfaces — best effort: a failed deletion is logged
//! and never masks the original persistence error. The save was already
//! counted by the pre-emptive quota increment; no second ledger call
//! happens here.

use crate::error::StageError;
use crate::model::{NewSavedItem, SavedItem};
use crate::storage::BlobStore;

use super::ItemStore;

/// Write one record joining upload result and classification result.
pub fn persist(
    items: &dyn ItemStore,
    blobs: &dyn BlobStore,
    record: &NewSavedItem,
) -> Result<SavedItem, StageError> {
    match items.insert(record) {
        Ok(item) => Ok(item),
        Err(insert_err) => {
            if let Err(delete_err) = blobs.delete(&record.storage_path) {
                tracing::warn!(
                    path = %record.storage_path,
                    error = %delete_err,
                    "compensating blob delete failed"
                );
            } else {
                tracing::debug!(path = %record.storage_path, "deleted orphaned blob");
            }
            Err(StageError::Persistence(insert_err.to_string()))
        }
    }
}

/// Explicit user delete: remove the record, then the underlying blob.
/// The blob removal is a compensating action, not a transaction; its
/// failure is logged only.
pub fn remove_saved_item(
    items: &dyn ItemStore,
    blobs: &dyn BlobStore,
    id: &str,
    storage_path: &str,
) -> anyhow::Result<()> {
    items.delete(id)?;

    if let Err(e) = blobs.delete(storage_path) {
        tracing::warn!(path = %storage_path, error = %e, "blob delete after item delete failed");
    }

    Ok(())
}
