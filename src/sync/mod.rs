// 🔄 Sync Engine - applies Source's ledgers and journal batches idempotently
//
// A journal batch flows through:
//   1. duplicate split (first occurrence of an id wins)
//   2. identity resolution (one bulk ledger lookup)
//   3. change detection (one bulk hash read)
//   4. apply (one batch insert, one update per changed row)
//   5. aggregation into a SyncResult
//
// Nothing is held between calls. The read-hash → decide → write sequence is
// not atomic across concurrent batches; last write wins.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MAX_ERROR_DETAILS;
use crate::entities::{
    ChangeLog, ChangeLogInput, JournalEntry, JournalRecord, LedgerRecord, LedgerSummary,
    UpsertAction,
};
use crate::error::{HubError, HubResult, StoreError};
use crate::store::{JournalRepository, LedgerRepository};

pub mod apply;
pub mod diff;
pub mod resolve;
pub mod result;

pub use diff::ChangeKind;
pub use result::{ResultAggregator, SyncResult};

/// Row counts used by the operator to confirm the store is reachable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SyncStats {
    pub ledgers: i64,
    pub journals: i64,
}

#[derive(Clone)]
pub struct SyncEngine {
    ledgers: Arc<dyn LedgerRepository>,
    journals: Arc<dyn JournalRepository>,
    max_error_details: usize,
}

impl SyncEngine {
    pub fn new(ledgers: Arc<dyn LedgerRepository>, journals: Arc<dyn JournalRepository>) -> Self {
        SyncEngine {
            ledgers,
            journals,
            max_error_details: DEFAULT_MAX_ERROR_DETAILS,
        }
    }

    pub fn with_max_error_details(mut self, max: usize) -> Self {
        self.max_error_details = max;
        self
    }

    // ========================================================================
    // Journals
    // ========================================================================

    pub fn sync_journals(&self, entries: Vec<JournalEntry>) -> HubResult<SyncResult> {
        self.sync_journals_at(entries, Utc::now())
    }

    /// Apply a validated batch, stamping every mutation with `synced_at`.
    ///
    /// Fails as a whole only if a bulk read fails, which happens before any
    /// write. From the first write on, every outcome lands in the result.
    pub fn sync_journals_at(
        &self,
        entries: Vec<JournalEntry>,
        synced_at: DateTime<Utc>,
    ) -> HubResult<SyncResult> {
        let submitted = entries.len();
        let mut agg = ResultAggregator::new(self.max_error_details);
        if submitted == 0 {
            return Ok(agg.finish());
        }

        let (unique, duplicates) = diff::split_duplicates(entries);
        for dup in &duplicates {
            warn!(external_id = %dup.external_id, "duplicate external_id in batch");
            agg.error(&dup.external_id, result::DUPLICATE_IN_BATCH);
        }

        let batch = resolve::resolve_ledgers(self.ledgers.as_ref(), unique)?;
        for entry in &batch.unresolved {
            warn!(
                external_id = %entry.external_id,
                ledger_external_id = %entry.ledger_external_id,
                "ledger not found"
            );
            agg.error(&entry.external_id, result::LEDGER_NOT_FOUND);
        }

        let ids: Vec<String> = batch
            .resolved
            .iter()
            .map(|(e, _)| e.external_id.clone())
            .collect();
        let stored_hashes = self.journals.fetch_content_hashes(&ids)?;

        let changes = diff::partition(batch.resolved, &stored_hashes);
        debug!(
            creates = changes.creates.len(),
            updates = changes.updates.len(),
            skipped = changes.skipped,
            "classified batch"
        );

        apply::apply_changes(self.journals.as_ref(), changes, synced_at, &mut agg);

        let result = agg.finish();
        debug_assert_eq!(result.total(), submitted);
        info!(
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            errors = result.errors,
            "journals synced"
        );
        Ok(result)
    }

    pub fn delete_journal(&self, external_id: &str) -> HubResult<usize> {
        self.delete_journals(&[external_id.to_string()])
    }

    pub fn delete_journals(&self, external_ids: &[String]) -> HubResult<usize> {
        let deleted = apply::delete_journals(self.journals.as_ref(), external_ids)?;
        info!(requested = external_ids.len(), deleted, "journals deleted");
        Ok(deleted)
    }

    // ========================================================================
    // Ledgers
    // ========================================================================

    pub fn submit_ledger(&self, summary: LedgerSummary) -> HubResult<(LedgerRecord, UpsertAction)> {
        self.submit_ledger_at(summary, Utc::now())
    }

    /// Create if absent, otherwise overwrite every aggregate.
    pub fn submit_ledger_at(
        &self,
        summary: LedgerSummary,
        now: DateTime<Utc>,
    ) -> HubResult<(LedgerRecord, UpsertAction)> {
        if let Some(mut existing) = self.ledgers.find_ledger(&summary.ledger_external_id)? {
            existing.overwrite(summary, now);
            return self.overwrite_ledger(existing);
        }

        let record = LedgerRecord::new(summary.clone(), now);
        match self.ledgers.insert_ledger(&record) {
            Ok(()) => {
                info!(
                    ledger_external_id = %record.ledger_external_id,
                    is_test = record.is_test,
                    "ledger created"
                );
                Ok((record, UpsertAction::Created))
            }
            // Lost a create race with a concurrent submit; fall back to overwrite
            Err(StoreError::UniqueViolation(_)) => {
                let mut existing = self
                    .ledgers
                    .find_ledger(&summary.ledger_external_id)?
                    .ok_or_else(|| HubError::NotFound(summary.ledger_external_id.clone()))?;
                existing.overwrite(summary, now);
                self.overwrite_ledger(existing)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn overwrite_ledger(&self, record: LedgerRecord) -> HubResult<(LedgerRecord, UpsertAction)> {
        if !self.ledgers.update_ledger(&record)? {
            return Err(HubError::NotFound(record.ledger_external_id));
        }
        info!(
            ledger_external_id = %record.ledger_external_id,
            is_test = record.is_test,
            "ledger updated"
        );
        Ok((record, UpsertAction::Updated))
    }

    pub fn record_change_log(&self, input: ChangeLogInput) -> HubResult<ChangeLog> {
        let required =
            || HubError::InvalidInput("ledger_external_id and change_summary are required".into());
        let ledger_external_id = input
            .ledger_external_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(required)?;
        let change_summary = input
            .change_summary
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(required)?;

        let ledger = self
            .ledgers
            .find_ledger(&ledger_external_id)?
            .ok_or_else(|| HubError::NotFound(format!("Ledger not found: {ledger_external_id}")))?;

        let log = ChangeLog {
            id: uuid::Uuid::new_v4().to_string(),
            ledger_id: ledger.id,
            changed_at: Utc::now(),
            change_summary,
            change_details: input.change_details,
        };
        self.ledgers.insert_change_log(&log)?;
        Ok(log)
    }

    /// Published view of one ledger: its record and every journal under it.
    pub fn journals_for_ledger(
        &self,
        ledger_external_id: &str,
    ) -> HubResult<(LedgerRecord, Vec<JournalRecord>)> {
        let ledger = self
            .ledgers
            .find_ledger(ledger_external_id)?
            .ok_or_else(|| HubError::NotFound("Ledger not found".into()))?;
        let journals = self.journals.list_journals_for_ledger(&ledger.id)?;
        debug!(ledger_external_id, journals = journals.len(), "ledger journals read");
        Ok((ledger, journals))
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn stats(&self) -> HubResult<SyncStats> {
        Ok(SyncStats {
            ledgers: self.ledgers.count_ledgers()?,
            journals: self.journals.count_journals()?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::LedgerInput;
    use crate::error::FieldError;
    use crate::store::{MemoryStore, SqliteStore};
    use crate::error::StoreResult;
    use chrono::Duration;
    use std::collections::HashMap;

    /// Minimal valid entry for engine tests.
    pub(crate) fn entry(external_id: &str, ledger_external_id: &str, hash: &str) -> JournalEntry {
        JournalEntry {
            external_id: external_id.into(),
            ledger_external_id: ledger_external_id.into(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 1, 15),
            description: Some("Venue rental".into()),
            amount: -20_000,
            counterparty_name: None,
            counterparty_type: None,
            account_code: "EXP_VENUE".into(),
            activity_classification: None,
            non_monetary_basis: None,
            note: None,
            public_subsidy_amount: None,
            content_hash: hash.into(),
            is_test: false,
        }
    }

    fn summary(external_id: &str) -> LedgerSummary {
        LedgerInput {
            ledger_external_id: Some(external_id.into()),
            politician_external_id: Some("P-1".into()),
            election_external_id: Some("E-1".into()),
            fiscal_year: Some(2025),
            total_income: Some(100),
            total_expense: Some(50),
            entry_count: Some(3),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn counts(result: &SyncResult) -> (usize, usize, usize, usize) {
        (result.created, result.updated, result.skipped, result.errors)
    }

    fn memory_engine() -> (Arc<MemoryStore>, SyncEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::new(store.clone(), store.clone());
        engine.submit_ledger(summary("L-1")).unwrap();
        (store, engine)
    }

    #[test]
    fn test_identical_batch_twice_is_idempotent() {
        let (store, engine) = memory_engine();
        let batch = vec![
            entry("a", "L-1", "h"),
            entry("b", "L-1", "h"),
            entry("c", "L-1", "h"),
        ];

        let first = engine.sync_journals(batch.clone()).unwrap();
        let second = engine.sync_journals(batch).unwrap();

        assert_eq!(counts(&first), (3, 0, 0, 0));
        assert_eq!(counts(&second), (0, 0, 3, 0));
        assert_eq!(store.count_journals().unwrap(), 3);
        println!("✅ Idempotency test PASSED: redelivery caused no mutation");
    }

    #[test]
    fn test_changed_hash_updates_once() {
        let (store, engine) = memory_engine();
        let t0 = Utc::now();
        engine.sync_journals_at(vec![entry("a", "L-1", "h1")], t0).unwrap();

        let mut changed = entry("a", "L-1", "h2");
        changed.amount = -25_000;
        changed.description = Some("Venue rental (revised)".into());
        let t1 = t0 + Duration::seconds(1);
        let result = engine.sync_journals_at(vec![changed], t1).unwrap();

        assert_eq!((result.created, result.updated, result.skipped), (0, 1, 0));
        let stored = store.find_journal("a").unwrap().unwrap();
        assert_eq!(stored.amount, -25_000);
        assert_eq!(stored.content_hash, "h2");
        assert!(stored.synced_at > t0);
    }

    #[test]
    fn test_skip_does_not_touch_synced_at() {
        let (store, engine) = memory_engine();
        let t0 = Utc::now();
        engine.sync_journals_at(vec![entry("a", "L-1", "h1")], t0).unwrap();

        engine
            .sync_journals_at(vec![entry("a", "L-1", "h1")], t0 + Duration::hours(1))
            .unwrap();

        assert_eq!(store.find_journal("a").unwrap().unwrap().synced_at, t0);
    }

    #[test]
    fn test_new_unchanged_and_missing_ledger() {
        let (_store, engine) = memory_engine();
        engine.sync_journals(vec![entry("B", "L-1", "hb")]).unwrap();

        let result = engine
            .sync_journals(vec![
                entry("A", "L-1", "ha"),
                entry("B", "L-1", "hb"),
                entry("C", "L-missing", "hc"),
            ])
            .unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.error_details, vec![FieldError::new("C", "ledger not found")]);
    }

    #[test]
    fn test_accounting_invariant_with_mixed_failures() {
        let (store, engine) = memory_engine();
        engine
            .sync_journals(vec![
                entry("u1", "L-1", "h1"),
                entry("u2", "L-1", "h1"),
                entry("s", "L-1", "h1"),
            ])
            .unwrap();
        store.fail_update_for("u2").unwrap();

        let batch = vec![
            entry("u1", "L-1", "h2"),
            entry("u2", "L-1", "h2"),
            entry("s", "L-1", "h1"),
            entry("n1", "L-1", "h1"),
            entry("n1", "L-1", "h9"),
            entry("x", "L-nope", "h1"),
        ];
        let submitted = batch.len();
        let result = engine.sync_journals(batch).unwrap();

        assert_eq!(result.total(), submitted);
        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 3);
    }

    #[test]
    fn test_batch_insert_failure_is_reported_not_raised() {
        let (store, engine) = memory_engine();
        engine.sync_journals(vec![entry("old", "L-1", "h1")]).unwrap();
        store.fail_inserts(true).unwrap();

        let result = engine
            .sync_journals(vec![
                entry("n1", "L-1", "h"),
                entry("n2", "L-1", "h"),
                entry("old", "L-1", "h2"),
            ])
            .unwrap();

        assert_eq!(result.created, 0);
        assert_eq!(result.updated, 1);
        assert_eq!(result.errors, 2);
        assert_eq!(result.error_details, vec![FieldError::new("batch", "insert failed")]);
    }

    #[test]
    fn test_bulk_reads_happen_once_per_batch() {
        let (store, engine) = memory_engine();
        let batch: Vec<JournalEntry> = (0..50)
            .map(|i| entry(&format!("j-{i}"), "L-1", "h"))
            .collect();

        engine.sync_journals(batch).unwrap();

        assert_eq!(store.hash_reads().unwrap(), 1);
        assert_eq!(store.insert_calls().unwrap(), 1);
    }

    #[test]
    fn test_read_failure_rejects_before_mutation() {
        let (store, engine) = memory_engine();
        store.fail_reads(true).unwrap();

        let err = engine.sync_journals(vec![entry("a", "L-1", "h")]).unwrap_err();

        assert!(matches!(err, HubError::Store(_)));
        assert_eq!(store.insert_calls().unwrap(), 0);
    }

    #[test]
    fn test_empty_batch() {
        let (_store, engine) = memory_engine();
        assert_eq!(engine.sync_journals(vec![]).unwrap(), SyncResult::default());
    }

    #[test]
    fn test_error_details_capped() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::new(store.clone(), store).with_max_error_details(2);

        let batch: Vec<JournalEntry> = (0..5)
            .map(|i| entry(&format!("j-{i}"), "L-none", "h"))
            .collect();
        let result = engine.sync_journals(batch).unwrap();

        assert_eq!(result.errors, 5);
        assert_eq!(result.error_details.len(), 2);
    }

    #[test]
    fn test_ledger_create_then_overwrite() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::new(store.clone(), store.clone());

        let (created, action) = engine.submit_ledger(summary("L-9")).unwrap();
        assert_eq!(action, UpsertAction::Created);

        let mut next = summary("L-9");
        next.total_income = 7_777;
        let (updated, action) = engine.submit_ledger(next).unwrap();

        assert_eq!(action, UpsertAction::Updated);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.total_income, 7_777);
        assert_eq!(store.count_ledgers().unwrap(), 1);
    }

    #[test]
    fn test_delete_single_and_missing() {
        let (_store, engine) = memory_engine();
        engine.sync_journals(vec![entry("a", "L-1", "h")]).unwrap();

        assert_eq!(engine.delete_journal("a").unwrap(), 1);
        assert_eq!(engine.delete_journal("a").unwrap(), 0);
        assert_eq!(engine.delete_journals(&[]).unwrap(), 0);
    }

    #[test]
    fn test_change_log_needs_known_ledger() {
        let (store, engine) = memory_engine();

        let log = engine
            .record_change_log(ChangeLogInput {
                ledger_external_id: Some("L-1".into()),
                change_summary: Some("Fixed a receipt date".into()),
                change_details: None,
            })
            .unwrap();
        assert_eq!(log.ledger_id, store.find_ledger("L-1").unwrap().unwrap().id);
        assert_eq!(store.change_logs().unwrap(), vec![log.clone()]);

        let err = engine
            .record_change_log(ChangeLogInput {
                ledger_external_id: Some("L-404".into()),
                change_summary: Some("x".into()),
                change_details: None,
            })
            .unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
        assert_eq!(store.change_logs().unwrap().len(), 1);
    }

    /// Deletes one journal right after the engine has read the hashes.
    struct ConcurrentDelete {
        inner: Arc<MemoryStore>,
        victim: String,
    }

    impl JournalRepository for ConcurrentDelete {
        fn fetch_content_hashes(&self, ids: &[String]) -> StoreResult<HashMap<String, String>> {
            let hashes = self.inner.fetch_content_hashes(ids)?;
            self.inner.remove_journal(&self.victim)?;
            Ok(hashes)
        }

        fn insert_journals(&self, rows: &[JournalRecord]) -> StoreResult<usize> {
            self.inner.insert_journals(rows)
        }

        fn update_journal(&self, row: &JournalRecord) -> StoreResult<bool> {
            self.inner.update_journal(row)
        }

        fn delete_journals(&self, external_ids: &[String]) -> StoreResult<usize> {
            self.inner.delete_journals(external_ids)
        }

        fn find_journal(&self, external_id: &str) -> StoreResult<Option<JournalRecord>> {
            self.inner.find_journal(external_id)
        }

        fn list_journals_for_ledger(&self, ledger_id: &str) -> StoreResult<Vec<JournalRecord>> {
            self.inner.list_journals_for_ledger(ledger_id)
        }

        fn count_journals(&self) -> StoreResult<i64> {
            self.inner.count_journals()
        }
    }

    #[test]
    fn test_journal_deleted_mid_sync_is_not_found() {
        let (store, engine) = memory_engine();
        engine
            .sync_journals(vec![entry("a", "L-1", "h1"), entry("b", "L-1", "h1")])
            .unwrap();

        let racing = SyncEngine::new(
            store.clone(),
            Arc::new(ConcurrentDelete {
                inner: store.clone(),
                victim: "a".into(),
            }),
        );
        let result = racing
            .sync_journals(vec![entry("a", "L-1", "h2"), entry("b", "L-1", "h2")])
            .unwrap();

        assert_eq!(counts(&result), (0, 1, 0, 1));
        assert_eq!(result.error_details, vec![FieldError::new("a", "journal not found")]);
        assert!(store.find_journal("a").unwrap().is_none());
    }

    #[test]
    fn test_journals_for_ledger() {
        let (_store, engine) = memory_engine();
        engine.submit_ledger(summary("L-2")).unwrap();

        let mut undated = entry("z", "L-1", "h");
        undated.date = None;
        engine
            .sync_journals(vec![undated, entry("m", "L-1", "h"), entry("other", "L-2", "h")])
            .unwrap();

        let (ledger, journals) = engine.journals_for_ledger("L-1").unwrap();
        let ids: Vec<&str> = journals.iter().map(|j| j.external_id.as_str()).collect();
        assert_eq!(ledger.ledger_external_id, "L-1");
        assert_eq!(ids, vec!["m", "z"]);

        let err = engine.journals_for_ledger("L-404").unwrap_err();
        assert!(matches!(err, HubError::NotFound(msg) if msg == "Ledger not found"));
    }

    #[test]
    fn test_engine_on_sqlite() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = SyncEngine::new(store.clone(), store.clone());
        engine.submit_ledger(summary("L-1")).unwrap();

        let t0 = Utc::now();
        let first = engine
            .sync_journals_at(vec![entry("a", "L-1", "h1"), entry("b", "L-1", "h1")], t0)
            .unwrap();
        let second = engine
            .sync_journals_at(
                vec![
                    entry("a", "L-1", "h1"),
                    entry("b", "L-1", "h2"),
                    entry("c", "L-x", "h"),
                ],
                t0 + Duration::seconds(1),
            )
            .unwrap();

        assert_eq!(first.created, 2);
        assert_eq!(counts(&second), (0, 1, 1, 1));
        assert_eq!(engine.stats().unwrap(), SyncStats { ledgers: 1, journals: 2 });
    }

    #[test]
    fn test_zero_subsidy_is_stored_on_sqlite() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = SyncEngine::new(store.clone(), store.clone());
        engine.submit_ledger(summary("L-1")).unwrap();

        let mut zero = entry("a", "L-1", "h1");
        zero.public_subsidy_amount = Some(0);
        engine.sync_journals(vec![zero]).unwrap();

        let stored = store.find_journal("a").unwrap().unwrap();
        assert_eq!(stored.public_subsidy_amount, Some(0));
    }
}
