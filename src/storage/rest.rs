//! Blob store backed by the hosted storage API.

use anyhow::{anyhow, Result};

use super::BlobStore;
use crate::config::{ApiConfig, UploadConfig};

pub struct RestBlobStore {
    api: ApiConfig,
    bucket: String,
}

impl RestBlobStore {
    pub fn new(api: ApiConfig, bucket: impl Into<String>) -> Self {
        Self {
            api,
            bucket: bucket.into(),
        }
    }

    pub fn from_config(api: &ApiConfig, upload: &UploadConfig) -> Self {
        Self::new(api.clone(), upload.bucket.clone())
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new().timeout(self.api.timeout()).build()
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.api.base_url, self.bucket, path
        )
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.api.base_url, self.bucket, path
        )
    }
}

impl BlobStore for RestBlobStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        // Upsert stays off so a path collision fails loudly instead of
        // clobbering an existing blob.
        self.agent()
            .post(&self.object_url(path))
            .set("apikey", &self.api.anon_key)
            .set("Authorization", &format!("Bearer {}", self.api.anon_key))
            .set("Content-Type", content_type)
            .set("x-upsert", "false")
            .send_bytes(bytes)
            .map_err(|e| anyhow!("blob upload failed for {}: {}", path, e))?;

        Ok(self.public_url(path))
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.agent()
            .delete(&self.object_url(path))
            .set("apikey", &self.api.anon_key)
            .set("Authorization", &format!("Bearer {}", self.api.anon_key))
            .call()
            .map_err(|e| anyhow!("blob delete failed for {}: {}", path, e))?;

        Ok(())
    }
}
