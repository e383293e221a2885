// 🔐 Lock-Gating - unlock request lifecycle for closed ledgers
//
//   LOCKED → UNLOCK_PENDING → UNLOCK_APPROVED(expires_at) → LOCKED
//                          ↘ rejected (back to LOCKED)
//
// LOCKED itself is decided outside the hub. Expiry is evaluated lazily
// when a caller checks; nothing runs on a timer.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DEFAULT_UNLOCK_DAYS, MAX_UNLOCK_DAYS};
use crate::entities::{
    ApproveInput, LedgerType, NewUnlockRequestInput, RejectInput, UnlockFilter, UnlockRequest,
    UnlockStatus,
};
use crate::error::{HubError, HubResult, StoreError};
use crate::store::UnlockRepository;

pub const MIN_REASON_CHARS: usize = 10;

/// What a check reports for one ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LockState {
    /// No active approval and nothing pending
    Locked,
    UnlockPending(UnlockRequest),
    UnlockApproved(UnlockRequest),
}

impl LockState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, LockState::UnlockApproved(_))
    }
}

/// Wire shape of a lock check.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LockCheck {
    Unlocked {
        is_unlocked: bool,
        expires_at: Option<DateTime<Utc>>,
        unlock_request: UnlockRequest,
    },
    Locked {
        is_unlocked: bool,
        pending_request: Option<UnlockRequest>,
    },
}

impl From<LockState> for LockCheck {
    fn from(state: LockState) -> Self {
        match state {
            LockState::UnlockApproved(request) => LockCheck::Unlocked {
                is_unlocked: true,
                expires_at: request.unlock_expires_at,
                unlock_request: request,
            },
            LockState::UnlockPending(request) => LockCheck::Locked {
                is_unlocked: false,
                pending_request: Some(request),
            },
            LockState::Locked => LockCheck::Locked {
                is_unlocked: false,
                pending_request: None,
            },
        }
    }
}

fn required(value: Option<String>, message: &str) -> HubResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HubError::InvalidInput(message.to_string()))
}

#[derive(Clone)]
pub struct UnlockService {
    repo: Arc<dyn UnlockRepository>,
    default_days: i64,
}

impl UnlockService {
    pub fn new(repo: Arc<dyn UnlockRepository>) -> Self {
        UnlockService {
            repo,
            default_days: DEFAULT_UNLOCK_DAYS,
        }
    }

    pub fn with_default_days(mut self, days: i64) -> Self {
        self.default_days = days;
        self
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    pub fn create(&self, input: NewUnlockRequestInput) -> HubResult<UnlockRequest> {
        self.create_at(input, Utc::now())
    }

    pub fn create_at(
        &self,
        input: NewUnlockRequestInput,
        now: DateTime<Utc>,
    ) -> HubResult<UnlockRequest> {
        let ledger_id = required(input.ledger_id, "ledger_id is required")?;
        let ledger_type = input
            .ledger_type
            .as_deref()
            .and_then(LedgerType::parse)
            .ok_or_else(|| {
                HubError::InvalidInput("ledger_type must be 'election' or 'organization'".into())
            })?;
        if ledger_type == LedgerType::Organization && input.fiscal_year.is_none() {
            return Err(HubError::InvalidInput(
                "fiscal_year is required for organization ledgers".into(),
            ));
        }
        let requested_by = required(input.requested_by, "requested_by is required")?;
        let requested_by_email =
            required(input.requested_by_email, "requested_by_email is required")?;
        let reason = input
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| r.chars().count() >= MIN_REASON_CHARS)
            .ok_or_else(|| {
                HubError::InvalidInput(format!(
                    "reason is required (at least {MIN_REASON_CHARS} characters)"
                ))
            })?;

        if let Some(existing) = self.repo.find_pending_request(&ledger_id)? {
            return Err(pending_conflict(existing));
        }

        let request = UnlockRequest {
            id: uuid::Uuid::new_v4().to_string(),
            ledger_id,
            ledger_type,
            fiscal_year: input.fiscal_year,
            requested_by,
            requested_by_email,
            reason,
            status: UnlockStatus::Pending,
            approved_at: None,
            approved_by: None,
            unlock_expires_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        match self.repo.insert_unlock_request(&request) {
            Ok(()) => {
                info!(request_id = %request.id, ledger_id = %request.ledger_id, "unlock requested");
                Ok(request)
            }
            // A concurrent create won between the read and the insert
            Err(StoreError::UniqueViolation(_)) => {
                match self.repo.find_pending_request(&request.ledger_id)? {
                    Some(existing) => Err(pending_conflict(existing)),
                    None => Err(HubError::Conflict("unlock request could not be created".into())),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // DECIDE
    // ========================================================================

    pub fn approve(&self, id: &str, input: ApproveInput) -> HubResult<UnlockRequest> {
        self.approve_at(id, input, Utc::now())
    }

    pub fn approve_at(
        &self,
        id: &str,
        input: ApproveInput,
        now: DateTime<Utc>,
    ) -> HubResult<UnlockRequest> {
        let approved_by = required(input.approved_by, "approved_by is required")?;
        let days = input.unlock_days.unwrap_or(self.default_days);
        if !(1..=MAX_UNLOCK_DAYS).contains(&days) {
            return Err(HubError::InvalidInput(format!(
                "unlock_days must be between 1 and {MAX_UNLOCK_DAYS}"
            )));
        }

        let mut request = self.pending(id)?;
        request.status = UnlockStatus::Approved;
        request.approved_at = Some(now);
        request.approved_by = Some(approved_by);
        request.unlock_expires_at = Some(now + Duration::days(days));
        request.updated_at = now;

        self.decide(request)
    }

    pub fn reject(&self, id: &str, input: RejectInput) -> HubResult<UnlockRequest> {
        self.reject_at(id, input, Utc::now())
    }

    pub fn reject_at(
        &self,
        id: &str,
        input: RejectInput,
        now: DateTime<Utc>,
    ) -> HubResult<UnlockRequest> {
        let rejection_reason = required(input.rejection_reason, "rejection_reason is required")?;

        let mut request = self.pending(id)?;
        request.status = UnlockStatus::Rejected;
        request.rejection_reason = Some(rejection_reason);
        request.updated_at = now;

        if let Some(reviewer) = input.rejected_by.as_deref() {
            info!(request_id = %request.id, rejected_by = %reviewer, "unlock rejected by reviewer");
        }
        self.decide(request)
    }

    fn pending(&self, id: &str) -> HubResult<UnlockRequest> {
        let request = self
            .repo
            .get_unlock_request(id)?
            .ok_or_else(|| HubError::NotFound("Unlock request not found".into()))?;
        if request.status != UnlockStatus::Pending {
            return Err(HubError::Conflict(format!(
                "unlock request is already {}",
                request.status.as_str()
            )));
        }
        Ok(request)
    }

    fn decide(&self, request: UnlockRequest) -> HubResult<UnlockRequest> {
        if !self.repo.record_decision(&request)? {
            // Someone else decided first
            warn!(request_id = %request.id, "unlock request decided concurrently");
            return Err(HubError::Conflict("unlock request is no longer pending".into()));
        }
        info!(
            request_id = %request.id,
            ledger_id = %request.ledger_id,
            status = request.status.as_str(),
            "unlock request decided"
        );
        Ok(request)
    }

    // ========================================================================
    // READ
    // ========================================================================

    pub fn get(&self, id: &str) -> HubResult<UnlockRequest> {
        self.repo
            .get_unlock_request(id)?
            .ok_or_else(|| HubError::NotFound("Unlock request not found".into()))
    }

    pub fn list(&self, filter: &UnlockFilter) -> HubResult<Vec<UnlockRequest>> {
        Ok(self.repo.list_unlock_requests(filter)?)
    }

    pub fn check(&self, ledger_id: &str) -> HubResult<LockState> {
        self.check_at(ledger_id, Utc::now())
    }

    /// Latest unexpired approval wins, then a pending request, else locked.
    pub fn check_at(&self, ledger_id: &str, now: DateTime<Utc>) -> HubResult<LockState> {
        let approved = self.repo.list_unlock_requests(&UnlockFilter {
            status: Some(UnlockStatus::Approved),
            ledger_id: Some(ledger_id.to_string()),
            ledger_type: None,
        })?;

        let active = approved
            .into_iter()
            .filter(|r| r.is_active_at(now))
            .max_by_key(|r| r.approved_at);
        if let Some(request) = active {
            return Ok(LockState::UnlockApproved(request));
        }

        Ok(match self.repo.find_pending_request(ledger_id)? {
            Some(request) => LockState::UnlockPending(request),
            None => LockState::Locked,
        })
    }
}

fn pending_conflict(existing: UnlockRequest) -> HubError {
    HubError::PendingRequestExists {
        existing_request_id: existing.id,
        created_at: existing.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};

    fn input(ledger_id: &str) -> NewUnlockRequestInput {
        NewUnlockRequestInput {
            ledger_id: Some(ledger_id.into()),
            ledger_type: Some("election".into()),
            fiscal_year: None,
            requested_by: Some("user-1".into()),
            requested_by_email: Some("treasurer@example.org".into()),
            reason: Some("Receipt for venue was filed twice".into()),
        }
    }

    fn approve_by(days: Option<i64>) -> ApproveInput {
        ApproveInput {
            approved_by: Some("reviewer-1".into()),
            unlock_days: days,
        }
    }

    fn service() -> UnlockService {
        UnlockService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_second_pending_request_conflicts_with_original() {
        let svc = service();
        let first = svc.create(input("L-1")).unwrap();

        let err = svc.create(input("L-1")).unwrap_err();

        match err {
            HubError::PendingRequestExists {
                existing_request_id,
                created_at,
            } => {
                assert_eq!(existing_request_id, first.id);
                assert_eq!(created_at, first.created_at);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_other_ledger_is_independent() {
        let svc = service();
        svc.create(input("L-1")).unwrap();
        assert!(svc.create(input("L-2")).is_ok());
    }

    #[test]
    fn test_short_reason_rejected() {
        let svc = service();
        let mut bad = input("L-1");
        bad.reason = Some("   too short   ".into());

        assert!(matches!(svc.create(bad).unwrap_err(), HubError::InvalidInput(_)));
    }

    #[test]
    fn test_organization_needs_fiscal_year() {
        let svc = service();
        let mut bad = input("L-1");
        bad.ledger_type = Some("organization".into());

        let err = svc.create(bad.clone()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input: fiscal_year is required for organization ledgers"
        );

        bad.fiscal_year = Some(2024);
        assert!(svc.create(bad).is_ok());
    }

    #[test]
    fn test_approve_uses_default_horizon() {
        let svc = service().with_default_days(7);
        let request = svc.create(input("L-1")).unwrap();
        let now = Utc::now();

        let approved = svc.approve_at(&request.id, approve_by(None), now).unwrap();

        assert_eq!(approved.status, UnlockStatus::Approved);
        assert_eq!(approved.unlock_expires_at, Some(now + Duration::days(7)));
        assert_eq!(approved.approved_by.as_deref(), Some("reviewer-1"));
    }

    #[test]
    fn test_approve_validates_days_and_reviewer() {
        let svc = service();
        let request = svc.create(input("L-1")).unwrap();

        assert!(svc.approve(&request.id, approve_by(Some(0))).is_err());
        assert!(svc.approve(&request.id, approve_by(Some(91))).is_err());
        assert!(svc
            .approve(&request.id, ApproveInput { approved_by: None, unlock_days: None })
            .is_err());
        assert_eq!(svc.get(&request.id).unwrap().status, UnlockStatus::Pending);
    }

    #[test]
    fn test_only_pending_can_be_decided() {
        let svc = service();
        let request = svc.create(input("L-1")).unwrap();
        svc.approve(&request.id, approve_by(Some(3))).unwrap();

        let err = svc
            .reject(
                &request.id,
                RejectInput {
                    rejected_by: None,
                    rejection_reason: Some("late".into()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));

        let missing = svc.approve("no-such-id", approve_by(None)).unwrap_err();
        assert!(matches!(missing, HubError::NotFound(_)));
    }

    #[test]
    fn test_rejected_request_frees_the_ledger() {
        let svc = service();
        let request = svc.create(input("L-1")).unwrap();
        svc.reject(
            &request.id,
            RejectInput {
                rejected_by: Some("reviewer-1".into()),
                rejection_reason: Some("Not enough detail".into()),
            },
        )
        .unwrap();

        assert_eq!(svc.check("L-1").unwrap(), LockState::Locked);
        assert!(svc.create(input("L-1")).is_ok());
    }

    #[test]
    fn test_check_walks_the_lifecycle() {
        let svc = service();
        let t0 = Utc::now();
        assert_eq!(svc.check_at("L-1", t0).unwrap(), LockState::Locked);

        let request = svc.create_at(input("L-1"), t0).unwrap();
        assert!(matches!(svc.check_at("L-1", t0).unwrap(), LockState::UnlockPending(_)));

        svc.approve_at(&request.id, approve_by(Some(2)), t0).unwrap();
        let state = svc.check_at("L-1", t0 + Duration::days(1)).unwrap();
        assert!(state.is_unlocked());

        // Expired: back to locked without anything else happening
        let later = svc.check_at("L-1", t0 + Duration::days(3)).unwrap();
        assert!(!later.is_unlocked());
        assert_eq!(later, LockState::Locked);
        assert_eq!(svc.get(&request.id).unwrap().status, UnlockStatus::Approved);
    }

    #[test]
    fn test_check_wire_shape() {
        let locked = serde_json::to_value(LockCheck::from(LockState::Locked)).unwrap();
        assert_eq!(locked, serde_json::json!({ "is_unlocked": false, "pending_request": null }));
    }

    #[test]
    fn test_lifecycle_on_sqlite() {
        let svc = UnlockService::new(Arc::new(SqliteStore::open_in_memory().unwrap()));
        let request = svc.create(input("L-1")).unwrap();
        assert!(svc.create(input("L-1")).is_err());

        svc.approve(&request.id, approve_by(None)).unwrap();

        assert!(svc.check("L-1").unwrap().is_unlocked());
        let listed = svc
            .list(&UnlockFilter {
                status: Some(UnlockStatus::Approved),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(listed.len(), 1);
    }
}
