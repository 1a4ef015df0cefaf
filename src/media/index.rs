//! Directory-backed media index.
//!
//! Enumerates a local screenshots directory, filters to portrait images
//! that look like phone screenshots, and serves opaque-locator lookups.
//! Asset ids are paths relative to the index root.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::MediaIndex;
use crate::config::MediaConfig;

#[derive(Debug, Clone)]
pub struct AssetEntry {
    pub asset_id: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetQuery {
    pub limit: usize,
    /// Cursor from a previous page's `end_cursor`.
    pub after: Option<String>,
}

impl AssetQuery {
    pub fn first_page(limit: usize) -> Self {
        Self { limit, after: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetPage {
    pub assets: Vec<AssetEntry>,
    pub has_more: bool,
    pub end_cursor: Option<String>,
}

pub struct DirectoryIndex {
    root: PathBuf,
    extensions: Vec<String>,
    min_aspect_ratio: f32,
}

impl DirectoryIndex {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>, min_aspect_ratio: f32) -> Self {
        Self {
            root: root.into(),
            extensions,
            min_aspect_ratio,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(
            config.screenshots_dir.clone(),
            config.image_extensions.clone(),
            config.min_aspect_ratio,
        )
    }

    fn has_image_extension(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        self.extensions.iter().any(|e| e.to_lowercase() == ext)
    }

    /// Walk the root and collect every screenshot-like image, newest
    /// capture first. Unreadable entries are skipped.
    fn collect_entries(&self) -> Vec<AssetEntry> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !self.has_image_extension(path) {
                continue;
            }

            let (width, height) = match image::image_dimensions(path) {
                Ok(dims) => dims,
                Err(_) => continue,
            };

            // Most phone screenshots are tall portrait; landscape photos
            // and near-square images are not screenshot candidates.
            if width == 0 || (height as f32 / width as f32) <= self.min_aspect_ratio {
                continue;
            }

            let captured_at = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(Utc::now);

            let asset_id = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            entries.push(AssetEntry {
                asset_id,
                path: path.to_path_buf(),
                width,
                height,
                captured_at,
            });
        }

        entries.sort_by(|a, b| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| a.asset_id.cmp(&b.asset_id))
        });
        entries
    }
}

impl MediaIndex for DirectoryIndex {
    fn lookup(&self, asset_id: &str) -> Result<PathBuf> {
        let path = self.root.join(asset_id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(anyhow!("asset not present in media index"))
        }
    }

    fn assets(&self, query: &AssetQuery) -> Result<AssetPage> {
        let entries = self.collect_entries();

        let start = match &query.after {
            Some(cursor) => entries
                .iter()
                .position(|e| &e.asset_id == cursor)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };

        let limit = if query.limit == 0 { entries.len() } else { query.limit };
        let page: Vec<AssetEntry> = entries.iter().skip(start).take(limit).cloned().collect();
        let has_more = start + page.len() < entries.len();
        let end_cursor = page.last().map(|e| e.asset_id.clone());

        Ok(AssetPage {
            assets: page,
            has_more,
            end_cursor,
        })
    }
}
