//! Vision client wrapping a provider implementation.
//!
//! The provider output is untrusted: enum fields are clamped against the
//! allow-lists, confidence to [0, 1], extracted text to its persisted
//! maximum. The two contracts differ on failure: `classify` always
//! returns a best-effort result, `generate` propagates the error for the
//! caller to decide.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::remote::{EdgeFunctionProvider, RawAnalysis, RawGenerated, VisionProvider};
use crate::config::ApiConfig;
use crate::error::StageError;
use crate::model::{
    clamp_confidence, truncate_text, Analysis, Category, GeneratedContent, SourcePlatform,
    SuggestedPlatform, VideoFormat,
};

pub struct VisionClient {
    provider: Arc<dyn VisionProvider>,
}

impl VisionClient {
    pub fn new(provider: Arc<dyn VisionProvider>) -> Self {
        Self { provider }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(Arc::new(EdgeFunctionProvider::new(api.clone())))
    }

    #[allow(dead_code)]
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Auto-categorize an image. Never fails: on any provider error the
    /// fallback result is returned, because classification failure must
    /// not block a save.
    pub fn classify(&self, image_bytes: &[u8]) -> Analysis {
        let encoded = BASE64.encode(image_bytes);
        match self.provider.analyze(&encoded) {
            Ok(raw) => clamp_analysis(raw),
            Err(e) => {
                tracing::warn!(error = %e, "image analysis failed, using fallback");
                Analysis::fallback()
            }
        }
    }

    /// Generate content for a user-chosen category. Unlike `classify`,
    /// a provider failure propagates; the orchestrator substitutes
    /// defaults and records a partial success.
    pub fn generate(
        &self,
        image_bytes: &[u8],
        category: Category,
    ) -> Result<GeneratedContent, StageError> {
        let encoded = BASE64.encode(image_bytes);
        let raw = self
            .provider
            .generate(&encoded, category)
            .map_err(|e| StageError::Classification(e.to_string()))?;
        Ok(clamp_generated(raw))
    }
}

impl Clone for VisionClient {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

fn clamp_analysis(raw: RawAnalysis) -> Analysis {
    Analysis {
        category: Category::from_wire(raw.category.as_deref().unwrap_or("")),
        source_platform: SourcePlatform::from_wire(raw.source_platform.as_deref().unwrap_or("")),
        extracted_text: truncate_text(raw.extracted_text.as_deref().unwrap_or("")),
        confidence: clamp_confidence(raw.confidence.unwrap_or(0.0)),
    }
}

fn clamp_generated(raw: RawGenerated) -> GeneratedContent {
    let outline = raw
        .outline
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();

    GeneratedContent {
        title: raw.title.unwrap_or_default(),
        hook: raw.hook.unwrap_or_default(),
        outline,
        format: VideoFormat::from_wire(raw.format.as_deref().unwrap_or("")),
        platform: SuggestedPlatform::from_wire(raw.platform.as_deref().unwrap_or("")),
        extracted_text: truncate_text(raw.extracted_text.as_deref().unwrap_or("")),
        confidence: clamp_confidence(raw.confidence.unwrap_or(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use serde_json::json;

    struct ScriptedProvider {
        analyze: Result<RawAnalysis>,
        generate: Result<RawGenerated>,
    }

    impl VisionProvider for ScriptedProvider {
        fn analyze(&self, _image_base64: &str) -> Result<RawAnalysis> {
            match &self.analyze {
                Ok(raw) => Ok(raw.clone()),
                Err(e) => Err(anyhow!("{}", e)),
            }
        }

        fn generate(&self, _image_base64: &str, _category: Category) -> Result<RawGenerated> {
            match &self.generate {
                Ok(raw) => Ok(raw.clone()),
                Err(e) => Err(anyhow!("{}", e)),
            }
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn client(analyze: Result<RawAnalysis>, generate: Result<RawGenerated>) -> VisionClient {
        VisionClient::new(Arc::new(ScriptedProvider { analyze, generate }))
    }

    #[test]
    fn classify_falls_back_on_provider_failure() {
        let client = client(Err(anyhow!("remote down")), Ok(RawGenerated::default()));
        let analysis = client.classify(b"bytes");
        assert_eq!(analysis.category, Category::Other);
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.extracted_text.is_empty());
    }

    #[test]
    fn classify_clamps_out_of_range_fields() {
        let raw = RawAnalysis {
            category: Some("recipes".to_string()),
            source_platform: Some("vimeo".to_string()),
            extracted_text: Some("x".repeat(5000)),
            confidence: Some(3.2),
        };
        let client = client(Ok(raw), Ok(RawGenerated::default()));

        let analysis = client.classify(b"bytes");
        assert_eq!(analysis.category, Category::Other);
        assert_eq!(analysis.source_platform, SourcePlatform::Other);
        assert_eq!(analysis.extracted_text.chars().count(), 1000);
        assert_eq!(analysis.confidence, 1.0);
    }

    #[test]
    fn classify_passes_valid_fields_through() {
        let raw = RawAnalysis {
            category: Some("hook".to_string()),
            source_platform: Some("tiktok".to_string()),
            extracted_text: Some("wait for it".to_string()),
            confidence: Some(0.9),
        };
        let client = client(Ok(raw), Ok(RawGenerated::default()));

        let analysis = client.classify(b"bytes");
        assert_eq!(analysis.category, Category::Hook);
        assert_eq!(analysis.source_platform, SourcePlatform::Tiktok);
        assert_eq!(analysis.extracted_text, "wait for it");
        assert_eq!(analysis.confidence, 0.9);
    }

    #[test]
    fn generate_propagates_provider_failure() {
        let client = client(Ok(RawAnalysis::default()), Err(anyhow!("remote down")));
        let err = client.generate(b"bytes", Category::VideoIdea).unwrap_err();
        assert!(matches!(err, StageError::Classification(_)));
    }

    #[test]
    fn generate_clamps_and_filters_outline() {
        let raw = RawGenerated {
            title: Some("Title".to_string()),
            hook: Some("Hook".to_string()),
            outline: Some(vec![json!("point one"), json!(42), json!("point two")]),
            format: Some("feature-film".to_string()),
            platform: Some("vine".to_string()),
            extracted_text: Some("text".to_string()),
            confidence: Some(-0.5),
        };
        let client = client(Ok(RawAnalysis::default()), Ok(raw));

        let generated = client.generate(b"bytes", Category::VideoIdea).unwrap();
        assert_eq!(generated.outline, vec!["point one", "point two"]);
        assert_eq!(generated.format, VideoFormat::Short);
        assert_eq!(generated.platform, SuggestedPlatform::Tiktok);
        assert_eq!(generated.confidence, 0.0);
    }
}
