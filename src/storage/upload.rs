//! Upload stage: normalize image bytes and push them to blob storage.

use anyhow::{anyhow, Result};
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use std::io::Cursor;
use std::path::Path;

use super::BlobStore;
use crate::error::StageError;
use crate::model::UploadResult;
use crate::session::AccountId;

/// Image bytes ready for upload and classification, re-encoded once so
/// both stages work from the same payload.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Load an image, downscale if either dimension exceeds `max_dimension`,
/// and re-encode as JPEG.
pub fn prepare_image(path: &Path, max_dimension: u32, quality: u8) -> Result<EncodedImage> {
    let img = image::open(path)
        .map_err(|e| anyhow!("Failed to open image {}: {}", path.display(), e))?;

    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| anyhow!("Failed to encode image as JPEG: {}", e))?;

    Ok(EncodedImage {
        bytes: buf.into_inner(),
        content_type: "image/jpeg",
        extension: "jpg",
    })
}

/// Push one image to blob storage under a fresh per-account path.
///
/// Path uniqueness relies on millisecond timestamps; the store's
/// no-overwrite contract turns a collision into a loud failure rather
/// than a clobbered blob.
pub fn upload_image(
    store: &dyn BlobStore,
    account: &AccountId,
    image: &EncodedImage,
) -> Result<UploadResult, StageError> {
    let storage_path = format!(
        "{}/{}.{}",
        account,
        Utc::now().timestamp_millis(),
        image.extension
    );

    let public_url = store
        .put(&storage_path, &image.bytes, image.content_type)
        .map_err(|e| StageError::Upload(e.to_string()))?;

    tracing::debug!(path = %storage_path, bytes = image.bytes.len(), "uploaded image");

    Ok(UploadResult {
        storage_path,
        public_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::sync::Mutex;

    struct RecordingStore {
        puts: Mutex<Vec<(String, usize, String)>>,
        fail: bool,
    }

    impl RecordingStore {
        fn new(fail: bool) -> Self {
            Self {
                puts: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl BlobStore for RecordingStore {
        fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String> {
            if self.fail {
                return Err(anyhow!("storage unavailable"));
            }
            self.puts.lock().unwrap().push((
                path.to_string(),
                bytes.len(),
                content_type.to_string(),
            ));
            Ok(format!("https://cdn.test/{}", path))
        }

        fn delete(&self, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    fn sample_image(width: u32, height: u32) -> EncodedImage {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([10, 20, 30]));
        img.save(&path).unwrap();
        prepare_image(&path, 1200, 85).unwrap()
    }

    #[test]
    fn prepare_downscales_oversized_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(100, 300, Rgb([200, 100, 0]));
        img.save(&path).unwrap();

        let encoded = prepare_image(&path, 150, 85).unwrap();
        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert!(decoded.height() <= 150);
        assert_eq!(encoded.content_type, "image/jpeg");
    }

    #[test]
    fn upload_builds_account_scoped_jpg_path() {
        let store = RecordingStore::new(false);
        let account = AccountId::new("user-9");
        let image = sample_image(9, 20);

        let result = upload_image(&store, &account, &image).unwrap();

        assert!(result.storage_path.starts_with("user-9/"));
        assert!(result.storage_path.ends_with(".jpg"));
        assert_eq!(
            result.public_url,
            format!("https://cdn.test/{}", result.storage_path)
        );

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].2, "image/jpeg");
    }

    #[test]
    fn upload_failure_maps_to_upload_error() {
        let store = RecordingStore::new(true);
        let account = AccountId::new("user-9");
        let image = sample_image(9, 20);

        let err = upload_image(&store, &account, &image).unwrap_err();
        assert!(matches!(err, StageError::Upload(_)));
    }
}
