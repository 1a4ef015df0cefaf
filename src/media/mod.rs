//! Local media references and their resolution.
//!
//! Some platforms never hand out a filesystem path for library-resident
//! photos, only an opaque locator valid for the current session. The
//! resolver turns either kind of reference into a readable path before
//! the pipeline touches bytes.

pub mod index;

use std::path::PathBuf;

use crate::error::StageError;
pub use index::{AssetEntry, AssetPage, AssetQuery, DirectoryIndex};

/// An ephemeral handle to an image selected for import. Lives only for
/// the duration of one import session; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    /// A directly readable file.
    File(PathBuf),
    /// An opaque photo-library locator that must be resolved through the
    /// media index before byte access.
    LibraryAsset { asset_id: String },
}

impl MediaReference {
    /// Short name for progress display.
    pub fn display_name(&self) -> String {
        match self {
            MediaReference::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string()),
            MediaReference::LibraryAsset { asset_id } => asset_id.clone(),
        }
    }
}

/// Read-only lookup from opaque asset locators to concrete paths, plus
/// enumeration of screenshot candidates.
pub trait MediaIndex: Send + Sync {
    /// Resolve an opaque locator to a readable path. Fails if the index
    /// has no entry, e.g. the asset was deleted between selection and
    /// processing.
    fn lookup(&self, asset_id: &str) -> anyhow::Result<PathBuf>;

    /// Enumerate screenshot-like assets, newest capture first.
    fn assets(&self, query: &AssetQuery) -> anyhow::Result<AssetPage>;
}

/// Normalize a media reference into a byte-readable local path.
pub fn resolve(reference: &MediaReference, index: &dyn MediaIndex) -> Result<PathBuf, StageError> {
    match reference {
        MediaReference::File(path) => Ok(path.clone()),
        MediaReference::LibraryAsset { asset_id } => index
            .lookup(asset_id)
            .map_err(|e| StageError::Resolution(format!("{}: {}", asset_id, e))),
    }
}
