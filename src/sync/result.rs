// 📊 Result Aggregator - per-item accounting for one journal batch
//
// Invariant: created + updated + skipped + errors == items attempted.
// Counts are never capped; only the detail list is.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::FieldError;

/// Pseudo-id for a failure of the whole create sub-batch.
pub const BATCH_ERROR_ID: &str = "batch";

// Caller-facing messages. Short and enumerable; store internals go to the log.
pub const LEDGER_NOT_FOUND: &str = "ledger not found";
pub const INSERT_FAILED: &str = "insert failed";
pub const UPDATE_FAILED: &str = "update failed";
pub const JOURNAL_NOT_FOUND: &str = "journal not found";
pub const DUPLICATE_IN_BATCH: &str = "duplicate external_id in batch";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_details: Vec<FieldError>,
}

impl SyncResult {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.errors
    }
}

pub struct ResultAggregator {
    result: SyncResult,
    max_details: usize,
    reported: HashSet<String>,
    batch_reported: bool,
}

impl ResultAggregator {
    pub fn new(max_details: usize) -> Self {
        ResultAggregator {
            result: SyncResult::default(),
            max_details,
            reported: HashSet::new(),
            batch_reported: false,
        }
    }

    pub fn created(&mut self, count: usize) {
        self.result.created += count;
    }

    pub fn updated(&mut self) {
        self.result.updated += 1;
    }

    pub fn skipped(&mut self, count: usize) {
        self.result.skipped += count;
    }

    /// One failing item. At most one detail entry per id.
    pub fn error(&mut self, external_id: &str, message: &str) {
        self.result.errors += 1;

        if self.has_room() && self.reported.insert(external_id.to_string()) {
            self.result
                .error_details
                .push(FieldError::new(external_id, message));
        }
    }

    /// `count` items of the create sub-batch failed together. Reported once
    /// under [`BATCH_ERROR_ID`], tracked apart from journal ids.
    pub fn batch_failed(&mut self, count: usize, message: &str) {
        self.result.errors += count;

        if self.has_room() && !self.batch_reported {
            self.batch_reported = true;
            self.result
                .error_details
                .push(FieldError::new(BATCH_ERROR_ID, message));
        }
    }

    fn has_room(&self) -> bool {
        self.result.error_details.len() < self.max_details
    }

    pub fn finish(self) -> SyncResult {
        self.result
    }
}
