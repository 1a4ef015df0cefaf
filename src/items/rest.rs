//! Item store backed by the hosted relational API.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ItemQuery, ItemStore};
use crate::config::ApiConfig;
use crate::model::{
    clamp_confidence, Category, ItemPatch, NewSavedItem, SavedItem, SourcePlatform,
    SuggestedPlatform, VideoFormat,
};
use crate::session::AccountId;

const TABLE: &str = "saved_items";

/// Row shape as returned by the API. Enum columns come back as strings
/// and are clamped on conversion; rows written by older clients may
/// carry values outside the current allow-lists.
#[derive(Debug, Deserialize)]
struct SavedItemRow {
    id: String,
    user_id: String,
    image_url: String,
    storage_path: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    source_platform: Option<String>,
    #[serde(default)]
    extracted_text: Option<String>,
    #[serde(default)]
    ai_confidence: Option<f32>,
    #[serde(default)]
    generated_title: Option<String>,
    #[serde(default)]
    generated_hook: Option<String>,
    #[serde(default)]
    generated_outline: Option<Vec<String>>,
    #[serde(default)]
    suggested_format: Option<String>,
    #[serde(default)]
    suggested_platform: Option<String>,
    #[serde(default)]
    user_note: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<SavedItemRow> for SavedItem {
    fn from(row: SavedItemRow) -> Self {
        SavedItem {
            id: row.id,
            account_id: AccountId::new(row.user_id),
            image_url: row.image_url,
            storage_path: row.storage_path,
            category: Category::from_wire(row.category.as_deref().unwrap_or("")),
            source_platform: SourcePlatform::from_wire(row.source_platform.as_deref().unwrap_or("")),
            extracted_text: row.extracted_text.unwrap_or_default(),
            ai_confidence: clamp_confidence(row.ai_confidence.unwrap_or(0.0)),
            generated_title: row.generated_title,
            generated_hook: row.generated_hook,
            generated_outline: row.generated_outline,
            suggested_format: row.suggested_format.as_deref().map(VideoFormat::from_wire),
            suggested_platform: row
                .suggested_platform
                .as_deref()
                .map(SuggestedPlatform::from_wire),
            user_note: row.user_note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategoryCell {
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Serialize)]
struct PatchBody<'a> {
    #[serde(flatten)]
    patch: &'a ItemPatch,
    updated_at: DateTime<Utc>,
}

pub struct RestItemStore {
    api: ApiConfig,
}

impl RestItemStore {
    pub fn new(api: ApiConfig) -> Self {
        Self { api }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new().timeout(self.api.timeout()).build()
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.api.base_url, TABLE)
    }

    fn authed(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.api.anon_key)
            .set("Authorization", &format!("Bearer {}", self.api.anon_key))
    }

    fn single_row(&self, rows: Vec<SavedItemRow>, op: &str) -> Result<SavedItem> {
        rows.into_iter()
            .next()
            .map(SavedItem::from)
            .ok_or_else(|| anyhow!("{} returned no row", op))
    }
}

impl ItemStore for RestItemStore {
    fn insert(&self, item: &NewSavedItem) -> Result<SavedItem> {
        let rows: Vec<SavedItemRow> = self
            .authed(self.agent().post(&self.table_url()))
            .set("Content-Type", "application/json")
            .set("Prefer", "return=representation")
            .send_json(item)
            .map_err(|e| anyhow!("item insert failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse insert response: {}", e))?;

        self.single_row(rows, "insert")
    }

    fn update(&self, id: &str, patch: &ItemPatch) -> Result<SavedItem> {
        let body = PatchBody {
            patch,
            updated_at: Utc::now(),
        };

        let rows: Vec<SavedItemRow> = self
            .authed(self.agent().request("PATCH", &self.table_url()))
            .set("Content-Type", "application/json")
            .set("Prefer", "return=representation")
            .query("id", &format!("eq.{}", id))
            .send_json(&body)
            .map_err(|e| anyhow!("item update failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse update response: {}", e))?;

        self.single_row(rows, "update")
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.authed(self.agent().delete(&self.table_url()))
            .query("id", &format!("eq.{}", id))
            .call()
            .map_err(|e| anyhow!("item delete failed: {}", e))?;

        Ok(())
    }

    fn fetch(&self, account: &AccountId, query: &ItemQuery) -> Result<Vec<SavedItem>> {
        let mut request = self
            .authed(self.agent().get(&self.table_url()))
            .query("select", "*")
            .query("user_id", &format!("eq.{}", account))
            .query("order", "created_at.desc")
            .query("limit", &query.limit.to_string())
            .query("offset", &query.offset.to_string());

        if let Some(category) = query.category {
            request = request.query("category", &format!("eq.{}", category));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("extracted_text", &format!("fts.{}", search));
        }

        let rows: Vec<SavedItemRow> = request
            .call()
            .map_err(|e| anyhow!("item fetch failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse fetch response: {}", e))?;

        Ok(rows.into_iter().map(SavedItem::from).collect())
    }

    fn category_counts(&self, account: &AccountId) -> Result<BTreeMap<Category, i64>> {
        let cells: Vec<CategoryCell> = self
            .authed(self.agent().get(&self.table_url()))
            .query("select", "category")
            .query("user_id", &format!("eq.{}", account))
            .call()
            .map_err(|e| anyhow!("category count fetch failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse category count response: {}", e))?;

        let mut counts = BTreeMap::new();
        for cell in cells {
            let category = Category::from_wire(cell.category.as_deref().unwrap_or(""));
            *counts.entry(category).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_conversion_clamps_enum_columns() {
        let row = SavedItemRow {
            id: "item-1".to_string(),
            user_id: "acct-1".to_string(),
            image_url: "https://cdn.test/a.jpg".to_string(),
            storage_path: "acct-1/1.jpg".to_string(),
            category: Some("memes".to_string()),
            source_platform: Some("vimeo".to_string()),
            extracted_text: None,
            ai_confidence: Some(7.0),
            generated_title: None,
            generated_hook: None,
            generated_outline: None,
            suggested_format: Some("long".to_string()),
            suggested_platform: Some("reels".to_string()),
            user_note: None,
            created_at: None,
            updated_at: None,
        };

        let item = SavedItem::from(row);
        assert_eq!(item.category, Category::Other);
        assert_eq!(item.source_platform, SourcePlatform::Other);
        assert_eq!(item.ai_confidence, 1.0);
        assert_eq!(item.suggested_format, Some(VideoFormat::Long));
        assert_eq!(item.suggested_platform, Some(SuggestedPlatform::Reels));
    }
}
