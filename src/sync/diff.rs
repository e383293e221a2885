// 🔍 Change Detection - create / update / skip by Source's content hash
//
// The comparison is plain string inequality on the stored and incoming
// digests. No field of the entry is ever compared directly.

use std::collections::{HashMap, HashSet};

use crate::entities::JournalEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Skip,
}

pub fn classify(entry: &JournalEntry, stored_hashes: &HashMap<String, String>) -> ChangeKind {
    match stored_hashes.get(&entry.external_id) {
        None => ChangeKind::Create,
        Some(stored) if *stored != entry.content_hash => ChangeKind::Update,
        Some(_) => ChangeKind::Skip,
    }
}

/// Entries split by what needs to happen to them.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub creates: Vec<(JournalEntry, String)>,
    pub updates: Vec<(JournalEntry, String)>,
    pub skipped: usize,
}

/// Classify entries already paired with their internal ledger id.
pub fn partition(
    entries: Vec<(JournalEntry, String)>,
    stored_hashes: &HashMap<String, String>,
) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (entry, ledger_id) in entries {
        match classify(&entry, stored_hashes) {
            ChangeKind::Create => changes.creates.push((entry, ledger_id)),
            ChangeKind::Update => changes.updates.push((entry, ledger_id)),
            ChangeKind::Skip => changes.skipped += 1,
        }
    }

    changes
}

/// Keep the first occurrence of each external_id. Later occurrences are
/// returned separately so they can be reported instead of racing the first.
pub fn split_duplicates(entries: Vec<JournalEntry>) -> (Vec<JournalEntry>, Vec<JournalEntry>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(entries.len());
    let mut duplicates = Vec::new();

    for entry in entries {
        if seen.insert(entry.external_id.clone()) {
            unique.push(entry);
        } else {
            duplicates.push(entry);
        }
    }

    (unique, duplicates)
}
