//! Quota-gated batch import pipeline.
//!
//! Items are processed one at a time, in selection order: quota check,
//! resolve, upload, classify, persist. Item *i* is fully persisted before
//! item *i+1*'s quota check. A denied quota check (or a ledger fault —
//! fail closed) halts the remaining batch; any stage failure after the
//! quota passed marks just that item failed and the batch continues.
//! Cross-device races on the counter are handled by the ledger's atomic
//! check-and-increment, not by anything client-side.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use crate::config::Config;
use crate::error::StageError;
use crate::items::{persist, ItemQuery, ItemStore, RestItemStore};
use crate::media::{self, DirectoryIndex, MediaIndex, MediaReference};
use crate::model::{Category, GeneratedContent, NewSavedItem, SavedItem};
use crate::quota::{QuotaLedger, RpcQuotaLedger};
use crate::session::AccountId;
use crate::storage::{prepare_image, upload_image, BlobStore, RestBlobStore};
use crate::tasks::{BackgroundTaskManager, TaskId, TaskProgress, TaskType, TaskUpdate};
use crate::vision::VisionClient;

/// Per-item pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    QuotaChecking,
    /// Denied by the quota gate; the batch halts here.
    Blocked,
    Resolving,
    Uploading,
    Classifying,
    Persisting,
    Succeeded,
    Failed,
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemState::Succeeded | ItemState::Failed | ItemState::Blocked
        )
    }

    fn stage_name(&self) -> &'static str {
        match self {
            ItemState::Pending => "Pending",
            ItemState::QuotaChecking => "Checking quota",
            ItemState::Blocked => "Blocked",
            ItemState::Resolving => "Resolving",
            ItemState::Uploading => "Uploading",
            ItemState::Classifying => "Classifying",
            ItemState::Persisting => "Saving",
            ItemState::Succeeded => "Saved",
            ItemState::Failed => "Failed",
        }
    }
}

/// One batch entry. `category` selects the flow: `None` auto-classifies,
/// `Some` runs category-driven generation (the share flow, where the user
/// picks a category per image).
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub media: MediaReference,
    pub category: Option<Category>,
}

impl BatchItem {
    pub fn auto(media: MediaReference) -> Self {
        Self {
            media,
            category: None,
        }
    }

    pub fn with_category(media: MediaReference, category: Category) -> Self {
        Self {
            media,
            category: Some(category),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub blocked: usize,
}

/// How the final report should be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Generic completion summary.
    Summary,
    /// Exactly one item succeeded; callers may jump straight to it.
    SingleItem { item_id: String },
    /// The quota gate blocked before anything else happened; show the
    /// upgrade prompt instead of a summary.
    UpgradeRequired,
    /// The ledger itself faulted; the batch halted fail-closed.
    LedgerFailed,
}

/// Final state of one batch run.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub tally: Tally,
    /// Items created by this batch, in processing order.
    pub items: Vec<SavedItem>,
    /// Terminal (or never-reached) state per input item.
    pub states: Vec<ItemState>,
    pub cancelled: bool,
    pub outcome: ReportOutcome,
    /// First library page re-fetched during reporting, if it succeeded.
    pub refreshed_items: Option<Vec<SavedItem>>,
    /// Category counters re-fetched during reporting, if it succeeded.
    pub refreshed_counts: Option<BTreeMap<Category, i64>>,
}

impl ImportReport {
    pub fn summary_message(&self) -> String {
        if self.cancelled {
            return format!("Cancelled after {} saved", self.tally.succeeded);
        }
        match (&self.outcome, self.tally.failed) {
            (ReportOutcome::UpgradeRequired, _) => "Monthly save limit reached".to_string(),
            (ReportOutcome::LedgerFailed, _) => "Could not verify save limit".to_string(),
            (_, 0) => format!("{} saved", self.tally.succeeded),
            (_, failed) => format!("{} saved, {} failed", self.tally.succeeded, failed),
        }
    }
}

enum Halt {
    Quota,
    Ledger,
}

/// Drives a batch of media references through the import stages.
pub struct BatchOrchestrator {
    ledger: Arc<dyn QuotaLedger>,
    index: Arc<dyn MediaIndex>,
    blobs: Arc<dyn BlobStore>,
    items: Arc<dyn ItemStore>,
    vision: VisionClient,
    account: AccountId,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl BatchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn QuotaLedger>,
        index: Arc<dyn MediaIndex>,
        blobs: Arc<dyn BlobStore>,
        items: Arc<dyn ItemStore>,
        vision: VisionClient,
        account: AccountId,
        max_dimension: u32,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            ledger,
            index,
            blobs,
            items,
            vision,
            account,
            max_dimension,
            jpeg_quality,
        }
    }

    /// Wire up the production backends from configuration.
    pub fn from_config(config: &Config, account: AccountId) -> Self {
        Self::new(
            Arc::new(RpcQuotaLedger::new(
                config.api.clone(),
                config.quota.free_tier_limit,
            )),
            Arc::new(DirectoryIndex::from_config(&config.media)),
            Arc::new(RestBlobStore::from_config(&config.api, &config.upload)),
            Arc::new(RestItemStore::new(config.api.clone())),
            VisionClient::from_config(&config.api),
            account,
            config.upload.max_dimension,
            config.upload.jpeg_quality,
        )
    }

    /// Process a whole batch, reporting progress over `tx` and honoring
    /// the cancellation flag between items. An item already mid-flight
    /// when cancellation is requested completes.
    pub fn run_cancellable(
        &self,
        batch: &[BatchItem],
        tx: &mpsc::Sender<TaskUpdate>,
        cancel_flag: &AtomicBool,
    ) -> ImportReport {
        let total = batch.len();
        let mut states = vec![ItemState::Pending; total];
        let mut tally = Tally::default();
        let mut saved = Vec::new();
        let mut cancelled = false;
        let mut halt: Option<Halt> = None;

        let _ = tx.send(TaskUpdate::Started { total });

        for (index, item) in batch.iter().enumerate() {
            if cancel_flag.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            let name = item.media.display_name();
            let mut report_stage = |state: ItemState| {
                let _ = tx.send(TaskUpdate::Progress(
                    TaskProgress::new(index + 1, total)
                        .with_item(&name)
                        .with_message(state.stage_name()),
                ));
            };

            states[index] = ItemState::QuotaChecking;
            report_stage(ItemState::QuotaChecking);

            match self.ledger.check_and_increment(&self.account) {
                Ok(decision) if decision.allowed => {}
                Ok(decision) => {
                    tracing::info!(count = decision.count, "save limit reached, halting batch");
                    states[index] = ItemState::Blocked;
                    tally.blocked += 1;
                    halt = Some(Halt::Quota);
                    break;
                }
                Err(e) => {
                    // Fail closed: an undeterminable ledger is a denial.
                    tracing::error!(error = %e, "quota ledger unavailable, halting batch");
                    states[index] = ItemState::Blocked;
                    tally.blocked += 1;
                    halt = Some(Halt::Ledger);
                    break;
                }
            }

            let result = self.process_item(item, |state| {
                states[index] = state;
                report_stage(state);
            });

            match result {
                Ok(saved_item) => {
                    states[index] = ItemState::Succeeded;
                    tally.succeeded += 1;
                    saved.push(saved_item);
                }
                Err(e) => {
                    tracing::error!(item = %name, error = %e, "import item failed");
                    states[index] = ItemState::Failed;
                    tally.failed += 1;
                }
            }
        }

        let report = self.report(tally, saved, states, cancelled, halt);

        if cancelled {
            let _ = tx.send(TaskUpdate::Cancelled);
        } else {
            let _ = tx.send(TaskUpdate::Completed {
                message: report.summary_message(),
            });
        }

        report
    }

    /// Run the post-quota stages for one item.
    fn process_item(
        &self,
        item: &BatchItem,
        mut on_stage: impl FnMut(ItemState),
    ) -> Result<SavedItem, StageError> {
        on_stage(ItemState::Resolving);
        let path = media::resolve(&item.media, self.index.as_ref())?;
        let encoded = prepare_image(&path, self.max_dimension, self.jpeg_quality)
            .map_err(|e| StageError::Resolution(e.to_string()))?;

        on_stage(ItemState::Uploading);
        let upload = upload_image(self.blobs.as_ref(), &self.account, &encoded)?;

        on_stage(ItemState::Classifying);
        let record = match item.category {
            None => {
                let analysis = self.vision.classify(&encoded.bytes);
                NewSavedItem::from_analysis(&self.account, &upload, &analysis)
            }
            Some(category) => {
                let generated = match self.vision.generate(&encoded.bytes, category) {
                    Ok(generated) => generated,
                    Err(e) => {
                        // Partial success: keep the chosen category with
                        // default content rather than dropping the save.
                        tracing::warn!(category = %category, error = %e, "generation failed, using defaults");
                        GeneratedContent::defaults()
                    }
                };
                NewSavedItem::from_generated(&self.account, &upload, category, &generated)
            }
        };

        on_stage(ItemState::Persisting);
        persist(self.items.as_ref(), self.blobs.as_ref(), &record)
    }

    /// Build the final report and trigger the library refresh.
    fn report(
        &self,
        tally: Tally,
        items: Vec<SavedItem>,
        states: Vec<ItemState>,
        cancelled: bool,
        halt: Option<Halt>,
    ) -> ImportReport {
        // Best-effort refresh of the external list and counters so the
        // UI can swap in server-side truth without another round trip.
        let refreshed_items = self
            .items
            .fetch(&self.account, &ItemQuery::default())
            .map_err(|e| tracing::warn!(error = %e, "post-import item refresh failed"))
            .ok();
        let refreshed_counts = self
            .items
            .category_counts(&self.account)
            .map_err(|e| tracing::warn!(error = %e, "post-import count refresh failed"))
            .ok();

        let outcome = match halt {
            Some(Halt::Ledger) => ReportOutcome::LedgerFailed,
            Some(Halt::Quota) if tally.succeeded == 0 && tally.failed == 0 => {
                ReportOutcome::UpgradeRequired
            }
            _ if tally.succeeded == 1 => ReportOutcome::SingleItem {
                item_id: items[0].id.clone(),
            },
            _ => ReportOutcome::Summary,
        };

        ImportReport {
            tally,
            items,
            states,
            cancelled,
            outcome,
            refreshed_items,
            refreshed_counts,
        }
    }
}

/// Spawn a batch import on a background thread registered with the task
/// manager. The final report arrives on the returned receiver; progress
/// and completion flow through the manager's task channel.
pub fn start_import(
    orchestrator: Arc<BatchOrchestrator>,
    batch: Vec<BatchItem>,
    manager: &mut BackgroundTaskManager,
    task_type: TaskType,
) -> (TaskId, mpsc::Receiver<ImportReport>) {
    let (task_id, tx, cancel_flag) = manager.register_task(task_type);
    let (report_tx, report_rx) = mpsc::channel();

    std::thread::spawn(move || {
        let report = orchestrator.run_cancellable(&batch, &tx, &cancel_flag);
        let _ = report_tx.send(report);
    });

    (task_id, report_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemPatch, Plan, SourcePlatform};
    use crate::quota::{QuotaDecision, QuotaSnapshot};
    use crate::vision::{RawAnalysis, RawGenerated, VisionProvider};
    use anyhow::{anyhow, Result};
    use chrono::Utc;
    use image::{ImageBuffer, Rgb};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // ------------------------------------------------------------------
    // Test collaborators
    // ------------------------------------------------------------------

    struct TestLedger {
        limit: u32,
        count: Mutex<u32>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl TestLedger {
        fn with_remaining(remaining: u32) -> Self {
            Self {
                limit: 50,
                count: Mutex::new(50 - remaining),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                limit: 50,
                count: Mutex::new(0),
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn count(&self) -> u32 {
            *self.count.lock().unwrap()
        }
    }

    impl QuotaLedger for TestLedger {
        fn check_and_increment(&self, _account: &AccountId) -> Result<QuotaDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("ledger unreachable"));
            }
            let mut count = self.count.lock().unwrap();
            if *count >= self.limit {
                return Ok(QuotaDecision {
                    allowed: false,
                    count: *count,
                    plan: Plan::Free,
                });
            }
            *count += 1;
            Ok(QuotaDecision {
                allowed: true,
                count: *count,
                plan: Plan::Free,
            })
        }

        fn snapshot(&self, _account: &AccountId) -> Result<QuotaSnapshot> {
            let count = self.count();
            Ok(QuotaSnapshot {
                count,
                plan: Plan::Free,
                limit: Some(self.limit),
                remaining: Some(self.limit.saturating_sub(count)),
            })
        }
    }

    #[derive(Default)]
    struct TestBlobStore {
        blobs: Mutex<HashMap<String, usize>>,
        deleted: Mutex<Vec<String>>,
        fail_on_put: Option<usize>,
        puts: AtomicUsize,
        cancel_on_put: Option<Arc<AtomicBool>>,
    }

    impl BlobStore for TestBlobStore {
        fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
            let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(flag) = &self.cancel_on_put {
                flag.store(true, Ordering::SeqCst);
            }
            if self.fail_on_put == Some(n) {
                return Err(anyhow!("storage fault"));
            }
            self.blobs
                .lock()
                .unwrap()
                .insert(path.to_string(), bytes.len());
            Ok(format!("https://cdn.test/{}", path))
        }

        fn delete(&self, path: &str) -> Result<()> {
            self.blobs.lock().unwrap().remove(path);
            self.deleted.lock().unwrap().push(path.to_string());
            Ok(())
        }
    }

    struct TestItemStore {
        rows: Mutex<Vec<SavedItem>>,
        next_id: AtomicUsize,
        fail_on_insert: Option<usize>,
        inserts: AtomicUsize,
    }

    impl TestItemStore {
        fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                next_id: AtomicUsize::new(1),
                fail_on_insert: None,
                inserts: AtomicUsize::new(0),
            }
        }

        fn failing_on(nth: usize) -> Self {
            Self {
                fail_on_insert: Some(nth),
                ..Self::new()
            }
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    impl ItemStore for TestItemStore {
        fn insert(&self, item: &NewSavedItem) -> Result<SavedItem> {
            let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_insert == Some(n) {
                return Err(anyhow!("insert rejected"));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let saved = SavedItem {
                id: format!("item-{}", id),
                account_id: AccountId::new(item.user_id.clone()),
                image_url: item.image_url.clone(),
                storage_path: item.storage_path.clone(),
                category: item.category,
                source_platform: item.source_platform,
                extracted_text: item.extracted_text.clone(),
                ai_confidence: item.ai_confidence,
                generated_title: item.generated_title.clone(),
                generated_hook: item.generated_hook.clone(),
                generated_outline: item.generated_outline.clone(),
                suggested_format: item.suggested_format,
                suggested_platform: item.suggested_platform,
                user_note: None,
                created_at: Some(Utc::now()),
                updated_at: None,
            };
            self.rows.lock().unwrap().push(saved.clone());
            Ok(saved)
        }

        fn update(&self, _id: &str, _patch: &ItemPatch) -> Result<SavedItem> {
            Err(anyhow!("unused"))
        }

        fn delete(&self, _id: &str) -> Result<()> {
            Ok(())
        }

        fn fetch(&self, _account: &AccountId, _query: &ItemQuery) -> Result<Vec<SavedItem>> {
            let mut rows = self.rows.lock().unwrap().clone();
            rows.reverse();
            Ok(rows)
        }

        fn category_counts(&self, _account: &AccountId) -> Result<BTreeMap<Category, i64>> {
            let mut counts = BTreeMap::new();
            for row in self.rows.lock().unwrap().iter() {
                *counts.entry(row.category).or_insert(0) += 1;
            }
            Ok(counts)
        }
    }

    struct FixedVision {
        generate_fails: bool,
    }

    impl VisionProvider for FixedVision {
        fn analyze(&self, _image_base64: &str) -> Result<RawAnalysis> {
            Ok(RawAnalysis {
                category: Some("hook".to_string()),
                source_platform: Some("tiktok".to_string()),
                extracted_text: Some("wait for it".to_string()),
                confidence: Some(0.8),
            })
        }

        fn generate(&self, _image_base64: &str, _category: Category) -> Result<RawGenerated> {
            if self.generate_fails {
                return Err(anyhow!("generation unavailable"));
            }
            Ok(RawGenerated {
                title: Some("Five hooks that work".to_string()),
                hook: Some("Stop scrolling".to_string()),
                outline: Some(vec![serde_json::json!("one"), serde_json::json!("two")]),
                format: Some("short".to_string()),
                platform: Some("tiktok".to_string()),
                extracted_text: Some("hook text".to_string()),
                confidence: Some(0.7),
            })
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    fn write_png(dir: &Path, name: &str) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(9, 20, Rgb([5, 5, 5]));
        img.save(dir.join(name)).unwrap();
    }

    struct Fixture {
        _dir: TempDir,
        ledger: Arc<TestLedger>,
        blobs: Arc<TestBlobStore>,
        items: Arc<TestItemStore>,
        orchestrator: BatchOrchestrator,
        batch: Vec<BatchItem>,
    }

    fn fixture(
        item_count: usize,
        ledger: TestLedger,
        blobs: TestBlobStore,
        items: TestItemStore,
        generate_fails: bool,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut batch = Vec::new();
        for i in 0..item_count {
            let name = format!("shot-{}.png", i);
            write_png(dir.path(), &name);
            batch.push(BatchItem::auto(MediaReference::File(dir.path().join(name))));
        }

        let ledger = Arc::new(ledger);
        let blobs = Arc::new(blobs);
        let items = Arc::new(items);
        let index = Arc::new(DirectoryIndex::new(
            dir.path(),
            vec!["png".to_string()],
            1.5,
        ));
        let vision = VisionClient::new(Arc::new(FixedVision { generate_fails }));

        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&ledger) as Arc<dyn QuotaLedger>,
            index,
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
            Arc::clone(&items) as Arc<dyn ItemStore>,
            vision,
            AccountId::new("acct-1"),
            1200,
            85,
        );

        Fixture {
            _dir: dir,
            ledger,
            blobs,
            items,
            orchestrator,
            batch,
        }
    }

    fn run(fixture: &Fixture) -> ImportReport {
        let (tx, _rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        fixture.orchestrator.run_cancellable(&fixture.batch, &tx, &cancel)
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[test]
    fn happy_path_saves_every_item() {
        let f = fixture(
            3,
            TestLedger::with_remaining(10),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );
        let initial_count = f.ledger.count();

        let report = run(&f);

        assert_eq!(
            report.tally,
            Tally {
                succeeded: 3,
                failed: 0,
                blocked: 0
            }
        );
        assert_eq!(report.items.len(), 3);
        assert!(report.states.iter().all(|s| *s == ItemState::Succeeded));
        assert_eq!(report.outcome, ReportOutcome::Summary);
        assert_eq!(f.ledger.count(), initial_count + 3);
        assert_eq!(f.items.len(), 3);
        // Reporting re-fetched the library and counters.
        assert_eq!(report.refreshed_items.as_ref().map(Vec::len), Some(3));
        assert_eq!(
            report
                .refreshed_counts
                .as_ref()
                .and_then(|c| c.get(&Category::Hook).copied()),
            Some(3)
        );
        // Classification fields flowed through to the records.
        assert!(report
            .items
            .iter()
            .all(|i| i.category == Category::Hook && i.source_platform == SourcePlatform::Tiktok));
    }

    #[test]
    fn quota_exhaustion_halts_the_remaining_batch() {
        let f = fixture(
            3,
            TestLedger::with_remaining(1),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );

        let report = run(&f);

        assert_eq!(
            report.tally,
            Tally {
                succeeded: 1,
                failed: 0,
                blocked: 1
            }
        );
        assert_eq!(
            report.states,
            vec![ItemState::Succeeded, ItemState::Blocked, ItemState::Pending]
        );
        // Item 3 was never attempted: two ledger calls only.
        assert_eq!(f.ledger.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.items.len(), 1);
        // One success still shortcuts to the item view.
        assert!(matches!(report.outcome, ReportOutcome::SingleItem { .. }));
    }

    #[test]
    fn five_item_batch_with_two_allowed_processes_exactly_two() {
        let f = fixture(
            5,
            TestLedger::with_remaining(2),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );

        let report = run(&f);

        assert_eq!(report.tally.succeeded, 2);
        assert_eq!(report.tally.blocked, 1);
        assert_eq!(
            report.states,
            vec![
                ItemState::Succeeded,
                ItemState::Succeeded,
                ItemState::Blocked,
                ItemState::Pending,
                ItemState::Pending
            ]
        );
        assert_eq!(f.ledger.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn immediate_quota_block_asks_for_upgrade() {
        let f = fixture(
            2,
            TestLedger::with_remaining(0),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );

        let report = run(&f);

        assert_eq!(
            report.tally,
            Tally {
                succeeded: 0,
                failed: 0,
                blocked: 1
            }
        );
        assert_eq!(report.outcome, ReportOutcome::UpgradeRequired);
        assert_eq!(f.items.len(), 0);
    }

    #[test]
    fn ledger_error_fails_closed() {
        let f = fixture(
            2,
            TestLedger::failing(),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );

        let report = run(&f);

        assert_eq!(report.tally.blocked, 1);
        assert_eq!(report.tally.succeeded, 0);
        assert_eq!(report.outcome, ReportOutcome::LedgerFailed);
        // Nothing was uploaded or persisted on an undeterminable ledger.
        assert!(f.blobs.blobs.lock().unwrap().is_empty());
        assert_eq!(f.items.len(), 0);
    }

    #[test]
    fn upload_failure_skips_the_item_and_continues() {
        let f = fixture(
            3,
            TestLedger::with_remaining(10),
            TestBlobStore {
                fail_on_put: Some(2),
                ..TestBlobStore::default()
            },
            TestItemStore::new(),
            false,
        );

        let report = run(&f);

        assert_eq!(
            report.tally,
            Tally {
                succeeded: 2,
                failed: 1,
                blocked: 0
            }
        );
        assert_eq!(
            report.states,
            vec![ItemState::Succeeded, ItemState::Failed, ItemState::Succeeded]
        );
        // No saved item and no blob left behind for the failed upload.
        assert_eq!(f.items.len(), 2);
        assert_eq!(f.blobs.blobs.lock().unwrap().len(), 2);
        assert!(f.blobs.deleted.lock().unwrap().is_empty());
    }

    #[test]
    fn persistence_failure_deletes_the_uploaded_blob() {
        let f = fixture(
            3,
            TestLedger::with_remaining(10),
            TestBlobStore::default(),
            TestItemStore::failing_on(2),
            false,
        );

        let report = run(&f);

        assert_eq!(report.tally.succeeded, 2);
        assert_eq!(report.tally.failed, 1);
        // The orphaned blob was compensated away, exactly once.
        assert_eq!(f.blobs.deleted.lock().unwrap().len(), 1);
        assert_eq!(f.blobs.blobs.lock().unwrap().len(), 2);
    }

    #[test]
    fn missing_asset_counts_as_failed() {
        let mut f = fixture(
            2,
            TestLedger::with_remaining(10),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );
        f.batch[0] = BatchItem::auto(MediaReference::LibraryAsset {
            asset_id: "deleted-between-selection-and-import.png".to_string(),
        });

        let report = run(&f);

        assert_eq!(
            report.states,
            vec![ItemState::Failed, ItemState::Succeeded]
        );
        assert_eq!(report.tally.failed, 1);
        assert_eq!(report.tally.succeeded, 1);
    }

    #[test]
    fn cancellation_stops_before_the_next_quota_check() {
        // The cancel request lands while item 1 is mid-upload; that item
        // completes, item 2 is never started.
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let f = fixture(
            3,
            TestLedger::with_remaining(10),
            TestBlobStore {
                cancel_on_put: Some(Arc::clone(&cancel_flag)),
                ..TestBlobStore::default()
            },
            TestItemStore::new(),
            false,
        );

        let (tx, _rx) = mpsc::channel();
        let report = f.orchestrator.run_cancellable(&f.batch, &tx, &cancel_flag);

        assert!(report.cancelled);
        assert_eq!(report.tally.succeeded, 1);
        assert_eq!(
            report.states,
            vec![ItemState::Succeeded, ItemState::Pending, ItemState::Pending]
        );
        assert_eq!(f.ledger.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn category_flow_persists_generated_content() {
        let mut f = fixture(
            1,
            TestLedger::with_remaining(10),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );
        let media = f.batch[0].media.clone();
        f.batch[0] = BatchItem::with_category(media, Category::VideoIdea);

        let report = run(&f);

        assert_eq!(report.tally.succeeded, 1);
        let item = &report.items[0];
        assert_eq!(item.category, Category::VideoIdea);
        assert_eq!(item.generated_title.as_deref(), Some("Five hooks that work"));
        assert_eq!(
            item.generated_outline.as_deref(),
            Some(&["one".to_string(), "two".to_string()][..])
        );
        assert!(matches!(report.outcome, ReportOutcome::SingleItem { .. }));
    }

    #[test]
    fn generation_failure_saves_defaults_as_partial_success() {
        let mut f = fixture(
            1,
            TestLedger::with_remaining(10),
            TestBlobStore::default(),
            TestItemStore::new(),
            true,
        );
        let media = f.batch[0].media.clone();
        f.batch[0] = BatchItem::with_category(media, Category::Script);

        let report = run(&f);

        assert_eq!(report.tally.succeeded, 1);
        assert_eq!(report.tally.failed, 0);
        let item = &report.items[0];
        assert_eq!(item.category, Category::Script);
        assert_eq!(item.generated_title.as_deref(), Some(""));
        assert_eq!(item.ai_confidence, 0.0);
    }

    #[test]
    fn progress_updates_flow_through_the_task_channel() {
        let f = fixture(
            2,
            TestLedger::with_remaining(10),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );

        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let report = f.orchestrator.run_cancellable(&f.batch, &tx, &cancel);
        drop(tx);

        let updates: Vec<TaskUpdate> = rx.iter().collect();
        assert!(matches!(updates.first(), Some(TaskUpdate::Started { total: 2 })));
        assert!(matches!(
            updates.last(),
            Some(TaskUpdate::Completed { .. })
        ));
        // Every progress frame carries an observable current/total.
        for update in &updates {
            if let TaskUpdate::Progress(progress) = update {
                assert!(progress.current >= 1 && progress.current <= 2);
                assert_eq!(progress.total, 2);
            }
        }
        assert_eq!(report.summary_message(), "2 saved");
    }

    #[test]
    fn start_import_delivers_the_report_and_completion() {
        let f = fixture(
            2,
            TestLedger::with_remaining(10),
            TestBlobStore::default(),
            TestItemStore::new(),
            false,
        );
        let mut manager = BackgroundTaskManager::new();

        let orchestrator = Arc::new(f.orchestrator);
        let (_task_id, report_rx) = start_import(
            Arc::clone(&orchestrator),
            f.batch.clone(),
            &mut manager,
            TaskType::BatchImport,
        );

        let report = report_rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();
        assert_eq!(report.tally.succeeded, 2);

        // The manager eventually observes completion.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            let completed = manager.poll_updates();
            if !completed.is_empty() {
                assert!(completed[0].success);
                break;
            }
            assert!(std::time::Instant::now() < deadline, "no completion observed");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }
}
