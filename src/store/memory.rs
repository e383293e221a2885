// 🧪 Memory Store - in-process maps for tests and development
//
// Mirrors the SQLite semantics the engine relies on: atomic batch insert,
// conditional update, idempotent delete and one pending unlock request per
// ledger. Specific operations can be told to fail.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{JournalRepository, LedgerRepository, UnlockRepository};
use crate::entities::{
    ChangeLog, JournalRecord, LedgerRecord, UnlockFilter, UnlockRequest, UnlockStatus,
};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    ledgers: HashMap<String, LedgerRecord>,
    journals: HashMap<String, JournalRecord>,
    unlock_requests: HashMap<String, UnlockRequest>,
    change_logs: Vec<ChangeLog>,

    fail_inserts: bool,
    fail_updates: HashSet<String>,
    fail_reads: bool,
    insert_calls: usize,
    hash_reads: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Every subsequent `insert_journals` call fails without writing.
    pub fn fail_inserts(&self, fail: bool) -> StoreResult<()> {
        self.state()?.fail_inserts = fail;
        Ok(())
    }

    /// `update_journal` fails for this external id.
    pub fn fail_update_for(&self, external_id: &str) -> StoreResult<()> {
        self.state()?.fail_updates.insert(external_id.to_string());
        Ok(())
    }

    /// Bulk reads and counts fail.
    pub fn fail_reads(&self, fail: bool) -> StoreResult<()> {
        self.state()?.fail_reads = fail;
        Ok(())
    }

    /// Number of `insert_journals` calls that carried at least one row.
    pub fn insert_calls(&self) -> StoreResult<usize> {
        Ok(self.state()?.insert_calls)
    }

    /// Number of `fetch_content_hashes` calls.
    pub fn hash_reads(&self) -> StoreResult<usize> {
        Ok(self.state()?.hash_reads)
    }

    pub fn change_logs(&self) -> StoreResult<Vec<ChangeLog>> {
        Ok(self.state()?.change_logs.clone())
    }

    /// Drop a journal behind the engine's back (simulates a concurrent delete).
    pub fn remove_journal(&self, external_id: &str) -> StoreResult<()> {
        self.state()?.journals.remove(external_id);
        Ok(())
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("injected failure".into())
}

impl LedgerRepository for MemoryStore {
    fn resolve_ledger_ids(&self, external_ids: &[String]) -> StoreResult<HashMap<String, String>> {
        let state = self.state()?;
        if state.fail_reads {
            return Err(unavailable());
        }
        Ok(external_ids
            .iter()
            .filter_map(|id| state.ledgers.get(id).map(|l| (id.clone(), l.id.clone())))
            .collect())
    }

    fn find_ledger(&self, external_id: &str) -> StoreResult<Option<LedgerRecord>> {
        Ok(self.state()?.ledgers.get(external_id).cloned())
    }

    fn insert_ledger(&self, record: &LedgerRecord) -> StoreResult<()> {
        let mut state = self.state()?;
        if state.ledgers.contains_key(&record.ledger_external_id) {
            return Err(StoreError::UniqueViolation(record.ledger_external_id.clone()));
        }
        state
            .ledgers
            .insert(record.ledger_external_id.clone(), record.clone());
        Ok(())
    }

    fn update_ledger(&self, record: &LedgerRecord) -> StoreResult<bool> {
        let mut state = self.state()?;
        match state.ledgers.get_mut(&record.ledger_external_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count_ledgers(&self) -> StoreResult<i64> {
        let state = self.state()?;
        if state.fail_reads {
            return Err(unavailable());
        }
        Ok(state.ledgers.len() as i64)
    }

    fn insert_change_log(&self, log: &ChangeLog) -> StoreResult<()> {
        self.state()?.change_logs.push(log.clone());
        Ok(())
    }
}

impl JournalRepository for MemoryStore {
    fn fetch_content_hashes(
        &self,
        external_ids: &[String],
    ) -> StoreResult<HashMap<String, String>> {
        let mut state = self.state()?;
        if state.fail_reads {
            return Err(unavailable());
        }
        state.hash_reads += 1;
        Ok(external_ids
            .iter()
            .filter_map(|id| {
                state
                    .journals
                    .get(id)
                    .map(|j| (id.clone(), j.content_hash.clone()))
            })
            .collect())
    }

    fn insert_journals(&self, rows: &[JournalRecord]) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut state = self.state()?;
        state.insert_calls += 1;
        if state.fail_inserts {
            return Err(unavailable());
        }
        // Check everything first so a failure leaves nothing behind
        let mut seen = HashSet::new();
        for row in rows {
            if state.journals.contains_key(&row.external_id) || !seen.insert(&row.external_id) {
                return Err(StoreError::UniqueViolation(row.external_id.clone()));
            }
        }
        for row in rows {
            state.journals.insert(row.external_id.clone(), row.clone());
        }
        Ok(rows.len())
    }

    fn update_journal(&self, row: &JournalRecord) -> StoreResult<bool> {
        let mut state = self.state()?;
        if state.fail_updates.contains(&row.external_id) {
            return Err(unavailable());
        }
        match state.journals.get_mut(&row.external_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_journals(&self, external_ids: &[String]) -> StoreResult<usize> {
        let mut state = self.state()?;
        Ok(external_ids
            .iter()
            .filter(|id| state.journals.remove(id.as_str()).is_some())
            .count())
    }

    fn find_journal(&self, external_id: &str) -> StoreResult<Option<JournalRecord>> {
        Ok(self.state()?.journals.get(external_id).cloned())
    }

    fn list_journals_for_ledger(&self, ledger_id: &str) -> StoreResult<Vec<JournalRecord>> {
        let state = self.state()?;
        if state.fail_reads {
            return Err(unavailable());
        }
        let mut rows: Vec<JournalRecord> = state
            .journals
            .values()
            .filter(|j| j.ledger_id == ledger_id)
            .cloned()
            .collect();
        rows.sort_by_key(|j| (j.date.is_none(), j.date, j.external_id.clone()));
        Ok(rows)
    }

    fn count_journals(&self) -> StoreResult<i64> {
        let state = self.state()?;
        if state.fail_reads {
            return Err(unavailable());
        }
        Ok(state.journals.len() as i64)
    }
}

impl UnlockRepository for MemoryStore {
    fn find_pending_request(&self, ledger_id: &str) -> StoreResult<Option<UnlockRequest>> {
        Ok(self
            .state()?
            .unlock_requests
            .values()
            .find(|r| r.ledger_id == ledger_id && r.status == UnlockStatus::Pending)
            .cloned())
    }

    fn insert_unlock_request(&self, request: &UnlockRequest) -> StoreResult<()> {
        let mut state = self.state()?;
        let clash = request.status == UnlockStatus::Pending
            && state
                .unlock_requests
                .values()
                .any(|r| r.ledger_id == request.ledger_id && r.status == UnlockStatus::Pending);
        if clash || state.unlock_requests.contains_key(&request.id) {
            return Err(StoreError::UniqueViolation(request.ledger_id.clone()));
        }
        state
            .unlock_requests
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    fn get_unlock_request(&self, id: &str) -> StoreResult<Option<UnlockRequest>> {
        Ok(self.state()?.unlock_requests.get(id).cloned())
    }

    fn list_unlock_requests(&self, filter: &UnlockFilter) -> StoreResult<Vec<UnlockRequest>> {
        let mut requests: Vec<UnlockRequest> = self
            .state()?
            .unlock_requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    fn record_decision(&self, request: &UnlockRequest) -> StoreResult<bool> {
        let mut state = self.state()?;
        match state.unlock_requests.get_mut(&request.id) {
            Some(existing) if existing.status == UnlockStatus::Pending => {
                *existing = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
