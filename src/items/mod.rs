//! Saved-item records and the relational store behind them.

pub mod persist;
pub mod rest;

use anyhow::Result;
use std::collections::BTreeMap;

use crate::model::{Category, ItemPatch, NewSavedItem, SavedItem};
use crate::session::AccountId;

pub use persist::{persist, remove_saved_item};
pub use rest::RestItemStore;

/// Filters and pagination for fetching a library page.
#[derive(Debug, Clone)]
pub struct ItemQuery {
    pub category: Option<Category>,
    /// Full-text search over extracted text.
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            limit: 20,
            offset: 0,
        }
    }
}

/// Relational store for saved items, one row per item keyed by a
/// generated id with a foreign key to the owning account.
pub trait ItemStore: Send + Sync {
    fn insert(&self, item: &NewSavedItem) -> Result<SavedItem>;

    fn update(&self, id: &str, patch: &ItemPatch) -> Result<SavedItem>;

    fn delete(&self, id: &str) -> Result<()>;

    /// Fetch a page of items for an account, newest first.
    fn fetch(&self, account: &AccountId, query: &ItemQuery) -> Result<Vec<SavedItem>>;

    /// Per-category item counts for an account.
    fn category_counts(&self, account: &AccountId) -> Result<BTreeMap<Category, i64>>;
}
