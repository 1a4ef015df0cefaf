//! Durable blob storage for uploaded images.

pub mod rest;
pub mod upload;

use anyhow::Result;

pub use rest::RestBlobStore;
pub use upload::{prepare_image, upload_image, EncodedImage};

/// Content-addressed blob storage.
///
/// `put` must reject overwrites: a colliding path fails loudly instead of
/// silently clobbering an existing blob.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return the public URL.
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    /// Delete the blob at `path`.
    fn delete(&self, path: &str) -> Result<()>;
}
