//! Stage-level error taxonomy for the import pipeline.
//!
//! Per-item errors are caught at the orchestrator boundary and converted
//! into tally entries; they are never propagated to the UI layer as
//! panics or unwound exceptions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    /// A local asset could not be resolved to a readable file, or its
    /// bytes could not be read/decoded. The asset may have been deleted
    /// between selection and processing.
    #[error("asset resolution failed: {0}")]
    Resolution(String),

    /// Network or storage fault while uploading. Nothing was persisted,
    /// so no compensating action is required.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The remote generation call failed. Only the category-driven
    /// contract raises this; auto-classification self-falls-back.
    #[error("classification failed: {0}")]
    Classification(String),

    /// The record write failed after a successful upload. The
    /// compensating blob deletion has already been attempted by the time
    /// this error surfaces.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The quota ledger RPC itself faulted. Callers must treat this as
    /// not-allowed (fail closed), never as an implicit grant.
    #[error("quota ledger unavailable: {0}")]
    Ledger(String),
}
