// #️⃣ Canonical content hash
//
// Source computes `content_hash` itself and the sync path trusts it as-is.
// This helper only exists for offline imports (CSV exports without a hash
// column), so that re-importing the same file stays idempotent.

use sha2::{Digest, Sha256};

use crate::entities::JournalEntryInput;

const FIELD_SEPARATOR: &str = "\u{1f}";

/// SHA-256 (lowercase hex) over the mutable fields, trimmed, in a fixed order.
///
/// `external_id` and `ledger_external_id` are identity, not content, and
/// are left out.
pub fn canonical_content_hash(entry: &JournalEntryInput) -> String {
    fn text(value: &Option<String>) -> &str {
        value.as_deref().map(str::trim).unwrap_or("")
    }
    fn number(value: Option<i64>) -> String {
        value.map(|n| n.to_string()).unwrap_or_default()
    }

    let fields = [
        text(&entry.date).to_string(),
        text(&entry.description).to_string(),
        number(entry.amount),
        text(&entry.counterparty_name).to_string(),
        text(&entry.counterparty_type).to_string(),
        text(&entry.account_code).to_string(),
        text(&entry.activity_classification).to_string(),
        text(&entry.non_monetary_basis).to_string(),
        text(&entry.note).to_string(),
        number(entry.public_subsidy_amount),
    ];

    let mut hasher = Sha256::new();
    hasher.update(fields.join(FIELD_SEPARATOR));
    format!("{:x}", hasher.finalize())
}
