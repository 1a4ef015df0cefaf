//! Client-side library state.
//!
//! Mirrors the server library for a UI: a paged item list under a
//! category filter, plus per-category counters. Exclusively owned by its
//! caller; the import pipeline hands refreshed server-side truth over in
//! its report instead of mutating this directly.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::import::ImportReport;
use crate::items::{persist::remove_saved_item, ItemQuery, ItemStore};
use crate::model::{Category, ItemPatch, SavedItem};
use crate::session::AccountId;
use crate::storage::BlobStore;

/// Items fetched per page.
pub const PAGE_SIZE: usize = 20;

pub struct Library {
    store: Arc<dyn ItemStore>,
    blobs: Arc<dyn BlobStore>,
    account: AccountId,
    items: Vec<SavedItem>,
    category_counts: BTreeMap<Category, i64>,
    current_category: Option<Category>,
    has_more: bool,
}

impl Library {
    pub fn new(store: Arc<dyn ItemStore>, blobs: Arc<dyn BlobStore>, account: AccountId) -> Self {
        Self {
            store,
            blobs,
            account,
            items: Vec::new(),
            category_counts: BTreeMap::new(),
            current_category: None,
            has_more: true,
        }
    }

    pub fn items(&self) -> &[SavedItem] {
        &self.items
    }

    pub fn category_counts(&self) -> &BTreeMap<Category, i64> {
        &self.category_counts
    }

    pub fn count_for(&self, category: Category) -> i64 {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    pub fn current_category(&self) -> Option<Category> {
        self.current_category
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Switch the category filter. The list resets and must be
    /// refreshed.
    pub fn set_category(&mut self, category: Option<Category>) {
        self.current_category = category;
        self.items.clear();
        self.has_more = true;
    }

    fn query(&self, offset: usize) -> ItemQuery {
        ItemQuery {
            category: self.current_category,
            search: None,
            limit: PAGE_SIZE,
            offset,
        }
    }

    /// Reload the first page under the current filter.
    pub fn refresh(&mut self) -> Result<()> {
        let page = self.store.fetch(&self.account, &self.query(0))?;
        self.has_more = page.len() == PAGE_SIZE;
        self.items = page;
        Ok(())
    }

    /// Fetch and append the next page.
    pub fn load_more(&mut self) -> Result<()> {
        if !self.has_more {
            return Ok(());
        }
        let page = self.store.fetch(&self.account, &self.query(self.items.len()))?;
        self.has_more = page.len() == PAGE_SIZE;
        self.items.extend(page);
        Ok(())
    }

    pub fn refresh_counts(&mut self) -> Result<()> {
        self.category_counts = self.store.category_counts(&self.account)?;
        Ok(())
    }

    /// Full-text search over extracted text, independent of the paged
    /// list.
    pub fn search(&self, text: &str) -> Result<Vec<SavedItem>> {
        self.store.fetch(
            &self.account,
            &ItemQuery {
                category: None,
                search: Some(text.to_string()),
                limit: PAGE_SIZE,
                offset: 0,
            },
        )
    }

    /// Apply an import report: prefer the server-side refresh it carries,
    /// fall back to splicing the new items in locally.
    pub fn apply_report(&mut self, report: &ImportReport) {
        match &report.refreshed_items {
            Some(refreshed) if self.current_category.is_none() => {
                self.has_more = refreshed.len() == PAGE_SIZE;
                self.items = refreshed.clone();
            }
            _ => {
                for item in report.items.iter().rev() {
                    self.add_item(item.clone());
                }
            }
        }
        if let Some(counts) = &report.refreshed_counts {
            self.category_counts = counts.clone();
        }
    }

    /// Prepend a newly saved item and bump its category counter.
    pub fn add_item(&mut self, item: SavedItem) {
        *self.category_counts.entry(item.category).or_insert(0) += 1;
        if self.current_category.is_none() || self.current_category == Some(item.category) {
            self.items.insert(0, item);
        }
    }

    /// Explicit user delete: remove the record and its blob, then update
    /// local state.
    pub fn remove_item(&mut self, id: &str, storage_path: &str) -> Result<()> {
        remove_saved_item(self.store.as_ref(), self.blobs.as_ref(), id, storage_path)?;

        if let Some(position) = self.items.iter().position(|i| i.id == id) {
            let removed = self.items.remove(position);
            let count = self.category_counts.entry(removed.category).or_insert(0);
            *count = (*count - 1).max(0);
        }
        Ok(())
    }

    /// User edit: note and/or category override.
    pub fn edit_item(&mut self, id: &str, patch: &ItemPatch) -> Result<SavedItem> {
        let updated = self.store.update(id, patch)?;

        if let Some(position) = self.items.iter().position(|i| i.id == id) {
            let old_category = self.items[position].category;
            if old_category != updated.category {
                let count = self.category_counts.entry(old_category).or_insert(0);
                *count = (*count - 1).max(0);
                *self.category_counts.entry(updated.category).or_insert(0) += 1;
            }
            self.items[position] = updated.clone();
        }
        Ok(updated)
    }
}
