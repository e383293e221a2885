// 🔓 Unlock Request - time-boxed permission to edit a closed ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockStatus {
    Pending,
    Approved,
    Rejected,
}

impl UnlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockStatus::Pending => "pending",
            UnlockStatus::Approved => "approved",
            UnlockStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(UnlockStatus::Pending),
            "approved" => Some(UnlockStatus::Approved),
            "rejected" => Some(UnlockStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerType {
    Election,
    Organization,
}

impl LedgerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerType::Election => "election",
            LedgerType::Organization => "organization",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "election" => Some(LedgerType::Election),
            "organization" => Some(LedgerType::Organization),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub id: String,
    pub ledger_id: String,
    pub ledger_type: LedgerType,
    pub fiscal_year: Option<i32>,
    pub requested_by: String,
    pub requested_by_email: String,
    pub reason: String,
    pub status: UnlockStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub unlock_expires_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnlockRequest {
    /// Approved and not yet expired at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == UnlockStatus::Approved
            && self.unlock_expires_at.map_or(false, |expires| expires >= now)
    }
}

// ============================================================================
// INPUTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewUnlockRequestInput {
    pub ledger_id: Option<String>,
    pub ledger_type: Option<String>,
    pub fiscal_year: Option<i32>,
    pub requested_by: Option<String>,
    pub requested_by_email: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApproveInput {
    pub approved_by: Option<String>,
    pub unlock_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RejectInput {
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
}

/// List filter; every field narrows the result when set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UnlockFilter {
    pub status: Option<UnlockStatus>,
    pub ledger_id: Option<String>,
    pub ledger_type: Option<LedgerType>,
}

impl UnlockFilter {
    pub fn matches(&self, request: &UnlockRequest) -> bool {
        self.status.map_or(true, |s| s == request.status)
            && self.ledger_id.as_deref().map_or(true, |l| l == request.ledger_id)
            && self.ledger_type.map_or(true, |t| t == request.ledger_type)
    }
}
