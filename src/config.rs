use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the hosted backend (relational API, storage, RPC and
    /// edge functions all hang off this root).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Publishable key sent as `apikey` / bearer token on every call.
    #[serde(default)]
    pub anon_key: String,

    /// Per-request timeout applied to each network stage.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:54321".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            anon_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Monthly save allowance on the free plan. The authoritative limit
    /// lives server-side; this value is used for display snapshots.
    #[serde(default = "default_free_tier_limit")]
    pub free_tier_limit: u32,
}

fn default_free_tier_limit() -> u32 {
    50
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_tier_limit: default_free_tier_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Images larger than this on either side are downscaled before
    /// upload.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_bucket() -> String {
    "saved-items".to_string()
}

fn default_max_dimension() -> u32 {
    1200
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory the media index enumerates for screenshot candidates.
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Minimum height/width ratio for an asset to count as a likely
    /// screenshot. Phone screenshots are tall portrait; this is a
    /// heuristic, not a guarantee.
    #[serde(default = "default_min_aspect_ratio")]
    pub min_aspect_ratio: f32,

    /// Page size for media index enumeration.
    #[serde(default = "default_media_page_size")]
    pub page_size: usize,
}

fn default_screenshots_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Screenshots")
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "webp".to_string(),
        "heic".to_string(),
    ]
}

fn default_min_aspect_ratio() -> f32 {
    1.5
}

fn default_media_page_size() -> usize {
    50
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            screenshots_dir: default_screenshots_dir(),
            image_extensions: default_image_extensions(),
            min_aspect_ratio: default_min_aspect_ratio(),
            page_size: default_media_page_size(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stashd")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.quota.free_tier_limit, 50);
        assert_eq!(config.upload.bucket, "saved-items");
        assert_eq!(config.upload.max_dimension, 1200);
        assert_eq!(config.media.min_aspect_ratio, 1.5);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://example.test"
            anon_key = "key"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://example.test");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.quota.free_tier_limit, 50);
    }
}
