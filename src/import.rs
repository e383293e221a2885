// 📥 Offline import - Source CSV / JSON exports → sync engine
//
// Used when Source cannot reach the hub over HTTP and hands over an export
// instead. The rows still go through validation and the sync engine, so a
// re-import of the same file is a no-op.

use anyhow::{Context, Result};
use std::path::Path;

use crate::entities::{JournalEntryInput, LedgerInput};
use crate::hash::canonical_content_hash;

/// Load a journal CSV export. Headers match the JSON field names.
///
/// Rows with an empty `content_hash` get the canonical hash.
pub fn load_journal_csv(csv_path: &Path) -> Result<Vec<JournalEntryInput>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut entries = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let mut entry: JournalEntryInput =
            result.with_context(|| format!("Failed to deserialize journal on line {}", line + 2))?;

        if entry.content_hash.as_deref().map_or(true, |h| h.trim().is_empty()) {
            entry.content_hash = Some(canonical_content_hash(&entry));
        }
        entries.push(entry);
    }

    Ok(entries)
}

/// Load one ledger summary from a JSON file (`{ "ledger": {...} }` or the bare object).
pub fn load_ledger_json(json_path: &Path) -> Result<LedgerInput> {
    let raw = std::fs::read_to_string(json_path)
        .with_context(|| format!("Failed to read {}", json_path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("Ledger file is not valid JSON")?;

    let ledger = match value.get("ledger") {
        Some(inner) => inner.clone(),
        None => value,
    };
    serde_json::from_value(ledger).context("Ledger file does not describe a ledger")
}
