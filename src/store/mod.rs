// 🗄️ Store - repository interfaces for the persisted state
//
// The sync engine only needs four journal primitives: bulk read by keys,
// bulk insert, per-row conditional update and delete by keys. Ledger and
// unlock-request access sit behind their own traits.
//
// SqliteStore (rusqlite, WAL) backs the binaries. MemoryStore backs tests
// and can be told to fail.

use std::collections::HashMap;

use crate::entities::{ChangeLog, JournalRecord, LedgerRecord, UnlockFilter, UnlockRequest};
use crate::error::StoreResult;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub trait LedgerRepository: Send + Sync {
    /// Resolve Source ledger ids to internal ids in one lookup.
    /// Unknown ids are simply absent from the returned map.
    fn resolve_ledger_ids(&self, external_ids: &[String]) -> StoreResult<HashMap<String, String>>;

    fn find_ledger(&self, external_id: &str) -> StoreResult<Option<LedgerRecord>>;

    fn insert_ledger(&self, record: &LedgerRecord) -> StoreResult<()>;

    /// Overwrite by `ledger_external_id`. Returns false when no row matched.
    fn update_ledger(&self, record: &LedgerRecord) -> StoreResult<bool>;

    fn count_ledgers(&self) -> StoreResult<i64>;

    fn insert_change_log(&self, log: &ChangeLog) -> StoreResult<()>;
}

pub trait JournalRepository: Send + Sync {
    /// Stored `content_hash` for every given id that exists, in one read.
    fn fetch_content_hashes(
        &self,
        external_ids: &[String],
    ) -> StoreResult<HashMap<String, String>>;

    /// Insert all rows atomically: either every row lands or none does.
    fn insert_journals(&self, rows: &[JournalRecord]) -> StoreResult<usize>;

    /// Replace the row with the same `external_id`, only if it still exists.
    /// Returns false when no row matched.
    fn update_journal(&self, row: &JournalRecord) -> StoreResult<bool>;

    /// Delete by id. Missing ids are not an error; returns how many rows went away.
    fn delete_journals(&self, external_ids: &[String]) -> StoreResult<usize>;

    fn find_journal(&self, external_id: &str) -> StoreResult<Option<JournalRecord>>;

    /// Every journal of one ledger (internal id), oldest date first,
    /// undated rows last, ties broken by `external_id`.
    fn list_journals_for_ledger(&self, ledger_id: &str) -> StoreResult<Vec<JournalRecord>>;

    fn count_journals(&self) -> StoreResult<i64>;
}

pub trait UnlockRepository: Send + Sync {
    fn find_pending_request(&self, ledger_id: &str) -> StoreResult<Option<UnlockRequest>>;

    /// Must fail with `StoreError::UniqueViolation` when a pending request
    /// for the same ledger already exists.
    fn insert_unlock_request(&self, request: &UnlockRequest) -> StoreResult<()>;

    fn get_unlock_request(&self, id: &str) -> StoreResult<Option<UnlockRequest>>;

    /// Newest first.
    fn list_unlock_requests(&self, filter: &UnlockFilter) -> StoreResult<Vec<UnlockRequest>>;

    /// Persist an approval or rejection, only if the stored request is
    /// still pending. Returns false otherwise.
    fn record_decision(&self, request: &UnlockRequest) -> StoreResult<bool>;
}
