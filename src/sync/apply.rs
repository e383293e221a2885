// ✍️ Apply Engine - execute the change set against the store
//
// Creates: one batch insert, all-or-nothing. If the store rejects it, every
// row of the batch is counted as errored under the pseudo-id "batch" and
// nothing is retried row by row.
//
// Updates: one conditional update per row, each accounted for on its own.

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use super::diff::ChangeSet;
use super::result::{ResultAggregator, INSERT_FAILED, JOURNAL_NOT_FOUND, UPDATE_FAILED};
use crate::entities::JournalRecord;
use crate::error::StoreResult;
use crate::store::JournalRepository;

pub fn apply_changes(
    journals: &dyn JournalRepository,
    changes: ChangeSet,
    synced_at: DateTime<Utc>,
    agg: &mut ResultAggregator,
) {
    agg.skipped(changes.skipped);

    let creates: Vec<JournalRecord> = changes
        .creates
        .into_iter()
        .map(|(entry, ledger_id)| entry.into_record(&ledger_id, synced_at))
        .collect();
    apply_creates(journals, &creates, agg);

    for (entry, ledger_id) in changes.updates {
        apply_update(journals, &entry.into_record(&ledger_id, synced_at), agg);
    }
}

pub fn apply_creates(
    journals: &dyn JournalRepository,
    rows: &[JournalRecord],
    agg: &mut ResultAggregator,
) {
    if rows.is_empty() {
        return;
    }

    match journals.insert_journals(rows) {
        Ok(inserted) => agg.created(inserted),
        Err(e) => {
            error!(rows = rows.len(), error = %e, "batch insert failed");
            agg.batch_failed(rows.len(), INSERT_FAILED);
        }
    }
}

pub fn apply_update(
    journals: &dyn JournalRepository,
    row: &JournalRecord,
    agg: &mut ResultAggregator,
) {
    match journals.update_journal(row) {
        Ok(true) => agg.updated(),
        Ok(false) => {
            // Deleted between the hash read and this write
            warn!(external_id = %row.external_id, "journal vanished before update");
            agg.error(&row.external_id, JOURNAL_NOT_FOUND);
        }
        Err(e) => {
            error!(external_id = %row.external_id, error = %e, "journal update failed");
            agg.error(&row.external_id, UPDATE_FAILED);
        }
    }
}

/// Delete by id. Ids that do not exist are ignored.
pub fn delete_journals(
    journals: &dyn JournalRepository,
    external_ids: &[String],
) -> StoreResult<usize> {
    let mut ids: Vec<String> = external_ids
        .iter()
        .filter(|id| !id.trim().is_empty())
        .cloned()
        .collect();
    ids.sort();
    ids.dedup();

    journals.delete_journals(&ids)
}
