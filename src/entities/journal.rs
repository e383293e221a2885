// 🧾 Journal Entry - one disclosed transaction line pushed by Source
//
// Identity is `external_id` (assigned by Source, opaque).
// `content_hash` is Source's digest of the mutable fields. It is the ONLY
// thing change detection looks at; the hub never recomputes it on sync.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ACTIVITY CLASSIFICATION
// ============================================================================

/// Election ledgers split spending into the campaign itself and the period
/// before candidacy was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityClassification {
    #[serde(rename = "campaign")]
    Campaign,

    #[serde(rename = "pre-campaign")]
    PreCampaign,
}

impl ActivityClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityClassification::Campaign => "campaign",
            ActivityClassification::PreCampaign => "pre-campaign",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "campaign" => Some(ActivityClassification::Campaign),
            "pre-campaign" => Some(ActivityClassification::PreCampaign),
            _ => None,
        }
    }
}

// ============================================================================
// WIRE INPUT
// ============================================================================

/// Journal line as it arrives on the wire.
///
/// Required fields are optional here so that a missing field becomes a
/// per-item validation message instead of an opaque decode failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JournalEntryInput {
    pub external_id: Option<String>,
    pub ledger_external_id: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<i64>,
    pub counterparty_name: Option<String>,
    pub counterparty_type: Option<String>,
    pub account_code: Option<String>,
    pub activity_classification: Option<String>,
    pub non_monetary_basis: Option<String>,
    pub note: Option<String>,
    pub public_subsidy_amount: Option<i64>,
    pub content_hash: Option<String>,
    #[serde(default)]
    pub is_test: bool,
}

// ============================================================================
// VALIDATED ENTRY
// ============================================================================

/// A structurally valid journal line, ready for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub external_id: String,
    pub ledger_external_id: String,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Smallest currency unit, signed
    pub amount: i64,
    /// Already redacted by Source
    pub counterparty_name: Option<String>,
    pub counterparty_type: Option<String>,
    pub account_code: String,
    pub activity_classification: Option<ActivityClassification>,
    pub non_monetary_basis: Option<String>,
    pub note: Option<String>,
    pub public_subsidy_amount: Option<i64>,
    pub content_hash: String,
    pub is_test: bool,
}

impl JournalEntry {
    /// Attach the resolved ledger and the server-assigned sync time.
    pub fn into_record(self, ledger_id: &str, synced_at: DateTime<Utc>) -> JournalRecord {
        JournalRecord {
            external_id: self.external_id,
            ledger_id: ledger_id.to_string(),
            date: self.date,
            description: self.description,
            amount: self.amount,
            counterparty_name: self.counterparty_name,
            counterparty_type: self.counterparty_type,
            account_code: self.account_code,
            activity_classification: self.activity_classification,
            non_monetary_basis: self.non_monetary_basis,
            note: self.note,
            public_subsidy_amount: self.public_subsidy_amount,
            content_hash: self.content_hash,
            is_test: self.is_test,
            synced_at,
        }
    }
}

// ============================================================================
// STORED ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub external_id: String,
    /// Internal ledger id (not Source's ledger id)
    pub ledger_id: String,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount: i64,
    pub counterparty_name: Option<String>,
    pub counterparty_type: Option<String>,
    pub account_code: String,
    pub activity_classification: Option<ActivityClassification>,
    pub non_monetary_basis: Option<String>,
    pub note: Option<String>,
    pub public_subsidy_amount: Option<i64>,
    pub content_hash: String,
    pub is_test: bool,
    pub synced_at: DateTime<Utc>,
}
