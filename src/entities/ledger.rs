// 📒 Ledger - aggregate disclosure book for one politician / organization / election run
//
// "Source's ledger id is the natural key, the hub's UUID is the internal identity."
//
// Journals point at the internal id, so identity resolution always goes
// through `ledger_external_id` → `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

// ============================================================================
// OWNER LINK
// ============================================================================

/// Who the ledger belongs to beyond the politician.
///
/// At most one of organization / election may be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "external_id", rename_all = "snake_case")]
pub enum OwnerLink {
    /// Personal ledger of the politician only
    Politician,

    /// Political organization's annual ledger
    Organization(String),

    /// Campaign ledger for one election run
    Election(String),
}

impl OwnerLink {
    pub fn organization_external_id(&self) -> Option<&str> {
        match self {
            OwnerLink::Organization(id) => Some(id),
            _ => None,
        }
    }

    pub fn election_external_id(&self) -> Option<&str> {
        match self {
            OwnerLink::Election(id) => Some(id),
            _ => None,
        }
    }

    /// Rebuild from the two nullable columns.
    pub fn from_columns(organization: Option<String>, election: Option<String>) -> HubResult<Self> {
        match (organization, election) {
            (None, None) => Ok(OwnerLink::Politician),
            (Some(org), None) => Ok(OwnerLink::Organization(org)),
            (None, Some(election)) => Ok(OwnerLink::Election(election)),
            (Some(_), Some(_)) => Err(HubError::InvalidInput(
                "only one of organization_external_id and election_external_id may be set".into(),
            )),
        }
    }
}

// ============================================================================
// WIRE INPUT
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LedgerInput {
    pub ledger_external_id: Option<String>,
    pub politician_external_id: Option<String>,
    pub organization_external_id: Option<String>,
    pub election_external_id: Option<String>,
    pub fiscal_year: Option<i32>,
    pub total_income: Option<i64>,
    pub total_expense: Option<i64>,
    pub entry_count: Option<i64>,
    #[serde(default)]
    pub is_test: bool,
}

/// Validated ledger summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub ledger_external_id: String,
    pub politician_external_id: String,
    pub owner: OwnerLink,
    pub fiscal_year: i32,
    pub total_income: i64,
    pub total_expense: i64,
    pub entry_count: i64,
    pub is_test: bool,
}

fn required(value: Option<String>, field: &str) -> HubResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(HubError::InvalidInput(format!("{field} is required"))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LedgerInput {
    pub fn validate(self) -> HubResult<LedgerSummary> {
        let ledger_external_id = required(self.ledger_external_id, "ledger_external_id")?;
        let politician_external_id =
            required(self.politician_external_id, "politician_external_id")?;
        let owner = OwnerLink::from_columns(
            non_blank(self.organization_external_id),
            non_blank(self.election_external_id),
        )?;

        let fiscal_year = self
            .fiscal_year
            .ok_or_else(|| HubError::InvalidInput("fiscal_year must be a number".into()))?;
        let total_income = self
            .total_income
            .ok_or_else(|| HubError::InvalidInput("total_income is required".into()))?;
        let total_expense = self
            .total_expense
            .ok_or_else(|| HubError::InvalidInput("total_expense is required".into()))?;
        let entry_count = self
            .entry_count
            .ok_or_else(|| HubError::InvalidInput("entry_count is required".into()))?;

        if total_income < 0 || total_expense < 0 || entry_count < 0 {
            return Err(HubError::InvalidInput(
                "totals and entry_count must not be negative".into(),
            ));
        }

        Ok(LedgerSummary {
            ledger_external_id,
            politician_external_id,
            owner,
            fiscal_year,
            total_income,
            total_expense,
            entry_count,
            is_test: self.is_test,
        })
    }
}

// ============================================================================
// STORED ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Internal identity (UUID v4)
    pub id: String,
    pub ledger_external_id: String,
    pub politician_external_id: String,
    pub organization_external_id: Option<String>,
    pub election_external_id: Option<String>,
    pub fiscal_year: i32,
    pub total_income: i64,
    pub total_expense: i64,
    pub entry_count: i64,
    pub is_test: bool,
    pub first_synced_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl LedgerRecord {
    pub fn new(summary: LedgerSummary, now: DateTime<Utc>) -> Self {
        LedgerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            ledger_external_id: summary.ledger_external_id,
            politician_external_id: summary.politician_external_id,
            organization_external_id: summary.owner.organization_external_id().map(str::to_string),
            election_external_id: summary.owner.election_external_id().map(str::to_string),
            fiscal_year: summary.fiscal_year,
            total_income: summary.total_income,
            total_expense: summary.total_expense,
            entry_count: summary.entry_count,
            is_test: summary.is_test,
            first_synced_at: now,
            last_updated_at: now,
        }
    }

    /// Full overwrite of aggregates and owner link. Identity and
    /// `first_synced_at` survive.
    pub fn overwrite(&mut self, summary: LedgerSummary, now: DateTime<Utc>) {
        self.politician_external_id = summary.politician_external_id;
        self.organization_external_id =
            summary.owner.organization_external_id().map(str::to_string);
        self.election_external_id = summary.owner.election_external_id().map(str::to_string);
        self.fiscal_year = summary.fiscal_year;
        self.total_income = summary.total_income;
        self.total_expense = summary.total_expense;
        self.entry_count = summary.entry_count;
        self.is_test = summary.is_test;
        self.last_updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

// ============================================================================
// CHANGE LOG
// ============================================================================

/// Free-form note from Source describing a ledger revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLog {
    pub id: String,
    pub ledger_id: String,
    pub changed_at: DateTime<Utc>,
    pub change_summary: String,
    pub change_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeLogInput {
    pub ledger_external_id: Option<String>,
    pub change_summary: Option<String>,
    pub change_details: Option<serde_json::Value>,
}
