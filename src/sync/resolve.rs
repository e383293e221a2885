// 🔗 Identity Resolution - Source ledger id → internal ledger id
//
// One bulk lookup per batch. An unknown ledger id is not a batch failure:
// the affected entries come back in `unresolved` and their siblings proceed.

use std::collections::BTreeSet;

use crate::entities::JournalEntry;
use crate::error::StoreResult;
use crate::store::LedgerRepository;

#[derive(Debug, Default)]
pub struct ResolvedBatch {
    /// Entry paired with its internal ledger id
    pub resolved: Vec<(JournalEntry, String)>,
    pub unresolved: Vec<JournalEntry>,
}

pub fn resolve_ledgers(
    ledgers: &dyn LedgerRepository,
    entries: Vec<JournalEntry>,
) -> StoreResult<ResolvedBatch> {
    let distinct: BTreeSet<&str> = entries.iter().map(|e| e.ledger_external_id.as_str()).collect();
    let external_ids: Vec<String> = distinct.into_iter().map(str::to_string).collect();

    let ledger_map = ledgers.resolve_ledger_ids(&external_ids)?;

    let mut batch = ResolvedBatch::default();
    for entry in entries {
        match ledger_map.get(&entry.ledger_external_id) {
            Some(ledger_id) => {
                let ledger_id = ledger_id.clone();
                batch.resolved.push((entry, ledger_id));
            }
            None => batch.unresolved.push(entry),
        }
    }

    Ok(batch)
}
