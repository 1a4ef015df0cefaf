//! Domain types shared across the pipeline stages.
//!
//! Every enum that crosses the wire has a clamping constructor that maps
//! unknown values to a safe default. The remote classification service is
//! untrusted input: the edge functions validate server-side, and we
//! re-validate here defensively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::AccountId;

/// Maximum length of extracted text persisted per item (in characters).
pub const EXTRACTED_TEXT_MAX: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    VideoIdea,
    Hook,
    Thumbnail,
    Script,
    Visual,
    Analytics,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::VideoIdea,
        Category::Hook,
        Category::Thumbnail,
        Category::Script,
        Category::Visual,
        Category::Analytics,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::VideoIdea => "video_idea",
            Category::Hook => "hook",
            Category::Thumbnail => "thumbnail",
            Category::Script => "script",
            Category::Visual => "visual",
            Category::Analytics => "analytics",
            Category::Other => "other",
        }
    }

    /// Parse a wire value, clamping anything outside the allow-list to
    /// `Other`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "video_idea" => Category::VideoIdea,
            "hook" => Category::Hook,
            "thumbnail" => Category::Thumbnail,
            "script" => Category::Script,
            "visual" => Category::Visual,
            "analytics" => Category::Analytics,
            _ => Category::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    Tiktok,
    Youtube,
    Instagram,
    Twitter,
    #[default]
    Other,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::Tiktok => "tiktok",
            SourcePlatform::Youtube => "youtube",
            SourcePlatform::Instagram => "instagram",
            SourcePlatform::Twitter => "twitter",
            SourcePlatform::Other => "other",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "tiktok" => SourcePlatform::Tiktok,
            "youtube" => SourcePlatform::Youtube,
            "instagram" => SourcePlatform::Instagram,
            "twitter" => SourcePlatform::Twitter,
            _ => SourcePlatform::Other,
        }
    }
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform suggested for a generated content idea. A different set from
/// [`SourcePlatform`]: the generator recommends where to publish, not
/// where a screenshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedPlatform {
    #[default]
    Tiktok,
    Youtube,
    Instagram,
    Reels,
}

impl SuggestedPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestedPlatform::Tiktok => "tiktok",
            SuggestedPlatform::Youtube => "youtube",
            SuggestedPlatform::Instagram => "instagram",
            SuggestedPlatform::Reels => "reels",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "youtube" => SuggestedPlatform::Youtube,
            "instagram" => SuggestedPlatform::Instagram,
            "reels" => SuggestedPlatform::Reels,
            _ => SuggestedPlatform::Tiktok,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Short,
    Long,
}

impl VideoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::Short => "short",
            VideoFormat::Long => "long",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        if value == "long" {
            VideoFormat::Long
        } else {
            VideoFormat::Short
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
}

impl Plan {
    pub fn from_wire(value: &str) -> Self {
        if value == "pro" {
            Plan::Pro
        } else {
            Plan::Free
        }
    }
}

/// Clamp a confidence score to [0, 1]. Non-finite values become 0.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Truncate extracted text to the persisted maximum, on a char boundary.
pub fn truncate_text(text: &str) -> String {
    if text.chars().count() <= EXTRACTED_TEXT_MAX {
        text.to_string()
    } else {
        text.chars().take(EXTRACTED_TEXT_MAX).collect()
    }
}

/// Result of auto-classifying one image. Immutable once produced; a later
/// user edit becomes a user-authored field on the saved item, not a
/// mutation of this struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub category: Category,
    pub source_platform: SourcePlatform,
    pub extracted_text: String,
    pub confidence: f32,
}

impl Analysis {
    /// The fallback returned when the remote call fails: classification
    /// failure must never block a save.
    pub fn fallback() -> Self {
        Self {
            category: Category::Other,
            source_platform: SourcePlatform::Other,
            extracted_text: String::new(),
            confidence: 0.0,
        }
    }
}

/// Content generated for a user-chosen category. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub title: String,
    pub hook: String,
    pub outline: Vec<String>,
    pub format: VideoFormat,
    pub platform: SuggestedPlatform,
    pub extracted_text: String,
    pub confidence: f32,
}

impl GeneratedContent {
    /// Defaults substituted when the generation call fails; the item is
    /// still saved under the chosen category as a partial success.
    pub fn defaults() -> Self {
        Self {
            title: String::new(),
            hook: String::new(),
            outline: Vec::new(),
            format: VideoFormat::Short,
            platform: SuggestedPlatform::Tiktok,
            extracted_text: String::new(),
            confidence: 0.0,
        }
    }
}

/// Stable address of an uploaded blob. `storage_path` is the durable key
/// used for later deletion; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub storage_path: String,
    pub public_url: String,
}

/// A persisted library entry: upload result + classification result +
/// owner + optional user-authored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedItem {
    pub id: String,
    pub account_id: AccountId,
    pub image_url: String,
    pub storage_path: String,
    pub category: Category,
    pub source_platform: SourcePlatform,
    pub extracted_text: String,
    pub ai_confidence: f32,
    pub generated_title: Option<String>,
    pub generated_hook: Option<String>,
    pub generated_outline: Option<Vec<String>>,
    pub suggested_format: Option<VideoFormat>,
    pub suggested_platform: Option<SuggestedPlatform>,
    pub user_note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for one saved item. Field names match the items table.
#[derive(Debug, Clone, Serialize)]
pub struct NewSavedItem {
    pub user_id: String,
    pub image_url: String,
    pub storage_path: String,
    pub category: Category,
    pub source_platform: SourcePlatform,
    pub extracted_text: String,
    pub ai_confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_hook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_outline: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_format: Option<VideoFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_platform: Option<SuggestedPlatform>,
}

impl NewSavedItem {
    pub fn from_analysis(account: &AccountId, upload: &UploadResult, analysis: &Analysis) -> Self {
        Self {
            user_id: account.as_str().to_string(),
            image_url: upload.public_url.clone(),
            storage_path: upload.storage_path.clone(),
            category: analysis.category,
            source_platform: analysis.source_platform,
            extracted_text: analysis.extracted_text.clone(),
            ai_confidence: analysis.confidence,
            generated_title: None,
            generated_hook: None,
            generated_outline: None,
            suggested_format: None,
            suggested_platform: None,
        }
    }

    pub fn from_generated(
        account: &AccountId,
        upload: &UploadResult,
        category: Category,
        generated: &GeneratedContent,
    ) -> Self {
        Self {
            user_id: account.as_str().to_string(),
            image_url: upload.public_url.clone(),
            storage_path: upload.storage_path.clone(),
            category,
            source_platform: SourcePlatform::Other,
            extracted_text: generated.extracted_text.clone(),
            ai_confidence: generated.confidence,
            generated_title: Some(generated.title.clone()),
            generated_hook: Some(generated.hook.clone()),
            generated_outline: Some(generated.outline.clone()),
            suggested_format: Some(generated.format),
            suggested_platform: Some(generated.platform),
        }
    }
}

/// User-authored edits to a saved item: a note and/or a category
/// override. The original classification fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}
