//! Vision provider trait and the hosted edge-function implementation.
//!
//! The remote service owns the prompts and branches its behavior by
//! category; this side only knows the two endpoints and the response
//! shapes. Responses are raw wire values — the client layer clamps them.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::model::Category;

/// Untrusted analysis payload as returned by the remote endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAnalysis {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source_platform: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Untrusted generation payload. The generate endpoint historically
/// returns `extractedText` where analyze returns `extracted_text`; accept
/// both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGenerated {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub hook: Option<String>,
    #[serde(default)]
    pub outline: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default, alias = "extractedText")]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Remote inference capability behind the two classification contracts.
pub trait VisionProvider: Send + Sync {
    /// Auto-categorize an image.
    fn analyze(&self, image_base64: &str) -> Result<RawAnalysis>;

    /// Generate content for a user-chosen category.
    fn generate(&self, image_base64: &str, category: Category) -> Result<RawGenerated>;

    /// Provider name for display.
    fn provider_name(&self) -> &'static str;
}

// ============================================================================
// Edge-function provider
// ============================================================================

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    #[serde(rename = "imageBase64")]
    image_base64: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "imageBase64")]
    image_base64: &'a str,
    category: &'a str,
}

pub struct EdgeFunctionProvider {
    api: ApiConfig,
}

impl EdgeFunctionProvider {
    pub fn new(api: ApiConfig) -> Self {
        Self { api }
    }

    fn post(&self, function: &str, body: impl Serialize) -> Result<ureq::Response> {
        let url = format!("{}/functions/v1/{}", self.api.base_url, function);

        let agent = ureq::AgentBuilder::new().timeout(self.api.timeout()).build();

        agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.api.anon_key))
            .send_json(body)
            .map_err(|e| anyhow!("{} request failed: {}", function, e))
    }
}

impl VisionProvider for EdgeFunctionProvider {
    fn analyze(&self, image_base64: &str) -> Result<RawAnalysis> {
        let response = self.post("analyze-image", AnalyzeRequest { image_base64 })?;
        response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse analyze-image response: {}", e))
    }

    fn generate(&self, image_base64: &str, category: Category) -> Result<RawGenerated> {
        let response = self.post(
            "generate-content",
            GenerateRequest {
                image_base64,
                category: category.as_str(),
            },
        )?;
        response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse generate-content response: {}", e))
    }

    fn provider_name(&self) -> &'static str {
        "edge-functions"
    }
}
