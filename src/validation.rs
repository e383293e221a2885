// 📐 Shape Layer - structural validation of a journal batch
//
// Runs before anything touches the store. Any problem here rejects the
// whole batch; nothing is partially applied.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::entities::{ActivityClassification, JournalEntry, JournalEntryInput};
use crate::error::FieldError;

/// Label used when an item has no usable external_id.
pub const UNKNOWN_ID: &str = "unknown";

pub type BatchValidation = Result<Vec<JournalEntry>, Vec<FieldError>>;

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Optional text fields; each must be a string or null.
const TEXT_FIELDS: [&str; 11] = [
    "external_id",
    "ledger_external_id",
    "date",
    "description",
    "counterparty_name",
    "counterparty_type",
    "account_code",
    "activity_classification",
    "non_monetary_basis",
    "note",
    "content_hash",
];

/// Name the first field that made an item undecodable. The decoder's own
/// text stays in the logs.
fn describe_decode_error(item: &Value) -> String {
    let Some(fields) = item.as_object() else {
        return "entry must be an object".into();
    };
    let integer = |name: &str| fields.get(name).map_or(true, |v| v.is_null() || v.is_i64());

    if !integer("amount") {
        return "amount must be a number".into();
    }
    if !integer("public_subsidy_amount") {
        return "public_subsidy_amount must be a number".into();
    }
    if fields.get("is_test").is_some_and(|v| !v.is_boolean()) {
        return "is_test must be a boolean".into();
    }
    TEXT_FIELDS
        .iter()
        .find(|name| fields.get(**name).is_some_and(|v| !v.is_null() && !v.is_string()))
        .map_or_else(|| "malformed entry".into(), |name| format!("{name} must be a string"))
}

/// Decode raw JSON items, then validate them. A decode failure (wrong type
/// for a field) is reported the same way as a missing field.
pub fn validate_raw_batch(items: &[Value]) -> BatchValidation {
    let mut inputs = Vec::with_capacity(items.len());
    let mut errors = Vec::new();

    for item in items {
        match serde_json::from_value::<JournalEntryInput>(item.clone()) {
            Ok(input) => inputs.push(input),
            Err(e) => {
                let id = item
                    .get("external_id")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(UNKNOWN_ID);
                debug!(journal_external_id = id, error = %e, "undecodable journal entry");
                errors.push(FieldError::new(id, describe_decode_error(item)));
            }
        }
    }

    match validate_batch(inputs) {
        Ok(entries) if errors.is_empty() => Ok(entries),
        Ok(_) => Err(errors),
        Err(mut more) => {
            errors.append(&mut more);
            Err(errors)
        }
    }
}

/// Validate every item, collecting all problems rather than stopping at the first.
pub fn validate_batch(inputs: Vec<JournalEntryInput>) -> BatchValidation {
    let mut entries = Vec::with_capacity(inputs.len());
    let mut errors = Vec::new();

    for input in inputs {
        match validate_entry(input) {
            Ok(entry) => entries.push(entry),
            Err(mut item_errors) => errors.append(&mut item_errors),
        }
    }

    if errors.is_empty() {
        Ok(entries)
    } else {
        Err(errors)
    }
}

pub fn validate_entry(input: JournalEntryInput) -> Result<JournalEntry, Vec<FieldError>> {
    let id = present(&input.external_id).unwrap_or(UNKNOWN_ID).to_string();
    let mut errors = Vec::new();

    if present(&input.external_id).is_none() {
        errors.push(FieldError::new(&id, "external_id is required"));
    }
    if present(&input.ledger_external_id).is_none() {
        errors.push(FieldError::new(&id, "ledger_external_id is required"));
    }
    if present(&input.account_code).is_none() {
        errors.push(FieldError::new(&id, "account_code is required"));
    }
    if input.amount.is_none() {
        errors.push(FieldError::new(&id, "amount must be a number"));
    }
    if present(&input.content_hash).is_none() {
        errors.push(FieldError::new(&id, "content_hash is required"));
    }
    if matches!(input.public_subsidy_amount, Some(n) if n < 0) {
        errors.push(FieldError::new(&id, "public_subsidy_amount must not be negative"));
    }

    let date = match present(&input.date) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                errors.push(FieldError::new(&id, "date must be YYYY-MM-DD"));
                None
            }
        },
        None => None,
    };

    let activity_classification = match present(&input.activity_classification) {
        Some(raw) => match ActivityClassification::parse(raw) {
            Some(c) => Some(c),
            None => {
                errors.push(FieldError::new(
                    &id,
                    "activity_classification must be campaign or pre-campaign",
                ));
                None
            }
        },
        None => None,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(JournalEntry {
        external_id: id,
        ledger_external_id: input.ledger_external_id.unwrap_or_default(),
        date,
        description: input.description,
        amount: input.amount.unwrap_or_default(),
        counterparty_name: input.counterparty_name,
        counterparty_type: input.counterparty_type,
        account_code: input.account_code.unwrap_or_default(),
        activity_classification,
        non_monetary_basis: input.non_monetary_basis,
        note: input.note,
        public_subsidy_amount: input.public_subsidy_amount,
        content_hash: input.content_hash.unwrap_or_default(),
        is_test: input.is_test,
    })
}
