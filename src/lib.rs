//! Stashd core: quota-gated screenshot import and library management for
//! content creators.
//!
//! The pipeline takes locally selected images through quota check,
//! resolution, upload, remote classification and persistence, one item at
//! a time, tolerating partial failure and halting when the monthly save
//! limit is hit. Remote collaborators (quota ledger, blob store,
//! relational store, vision endpoints) sit behind traits with HTTP
//! implementations against the hosted backend.

pub mod config;
pub mod error;
pub mod import;
pub mod items;
pub mod library;
pub mod logging;
pub mod media;
pub mod model;
pub mod quota;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod vision;

pub use config::Config;
pub use error::StageError;
pub use import::{
    start_import, BatchItem, BatchOrchestrator, ImportReport, ItemState, ReportOutcome, Tally,
};
pub use library::Library;
pub use model::{Analysis, Category, GeneratedContent, SavedItem, SourcePlatform, UploadResult};
pub use quota::{QuotaDecision, QuotaLedger, QuotaSnapshot, RpcQuotaLedger};
pub use session::{AccountId, SessionProvider, StaticSession};
