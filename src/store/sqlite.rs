// 🗄️ SQLite store - rusqlite + WAL
//
// Timestamps are stored as RFC 3339 text in UTC with microsecond precision,
// so lexical order equals chronological order. Bulk reads pass the id list
// as one JSON parameter and expand it with json_each, so a batch lookup is a
// single statement no matter how many ids it carries.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{JournalRepository, LedgerRepository, UnlockRepository};
use crate::entities::{
    ActivityClassification, ChangeLog, JournalRecord, LedgerRecord, LedgerType, UnlockFilter,
    UnlockRequest, UnlockStatus,
};
use crate::error::{StoreError, StoreResult};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    // Enable WAL mode for crash recovery (no-op for in-memory databases)
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Ledgers (one row per Source ledger)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledgers (
            id TEXT PRIMARY KEY,
            ledger_external_id TEXT UNIQUE NOT NULL,
            politician_external_id TEXT NOT NULL,
            organization_external_id TEXT,
            election_external_id TEXT,
            fiscal_year INTEGER NOT NULL,
            total_income INTEGER NOT NULL,
            total_expense INTEGER NOT NULL,
            entry_count INTEGER NOT NULL,
            is_test INTEGER NOT NULL DEFAULT 0,
            first_synced_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL,
            CHECK (organization_external_id IS NULL OR election_external_id IS NULL)
        )",
        [],
    )?;

    // ==========================================================================
    // Journals (one row per Source journal line)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS journals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT UNIQUE NOT NULL,
            ledger_id TEXT NOT NULL REFERENCES ledgers(id),
            date TEXT,
            description TEXT,
            amount INTEGER NOT NULL,
            counterparty_name TEXT,
            counterparty_type TEXT,
            account_code TEXT NOT NULL,
            activity_classification TEXT,
            non_monetary_basis TEXT,
            note TEXT,
            public_subsidy_amount INTEGER,
            content_hash TEXT NOT NULL,
            is_test INTEGER NOT NULL DEFAULT 0,
            synced_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Unlock requests (lock-gating workflow)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS unlock_requests (
            id TEXT PRIMARY KEY,
            ledger_id TEXT NOT NULL,
            ledger_type TEXT NOT NULL,
            fiscal_year INTEGER,
            requested_by TEXT NOT NULL,
            requested_by_email TEXT NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL,
            approved_at TEXT,
            approved_by TEXT,
            unlock_expires_at TEXT,
            rejection_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Change logs (Source's notes about ledger revisions)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_change_logs (
            id TEXT PRIMARY KEY,
            ledger_id TEXT NOT NULL REFERENCES ledgers(id),
            changed_at TEXT NOT NULL,
            change_summary TEXT NOT NULL,
            change_details TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_journals_ledger ON journals(ledger_id)",
        [],
    )?;

    // At most one pending request per ledger, enforced by the store as well
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_unlock_one_pending
         ON unlock_requests(ledger_id) WHERE status = 'pending'",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_unlock_ledger ON unlock_requests(ledger_id, status)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// Column helpers
// ============================================================================

fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e.to_string()))
    })
    .transpose()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn id_list(ids: &[String]) -> StoreResult<String> {
    Ok(serde_json::to_string(ids)?)
}

const JOURNAL_COLUMNS: &str = "external_id, ledger_id, date, description, amount,
    counterparty_name, counterparty_type, account_code, activity_classification,
    non_monetary_basis, note, public_subsidy_amount, content_hash, is_test, synced_at";

fn journal_from_row(row: &Row<'_>) -> rusqlite::Result<JournalRecord> {
    let date: Option<String> = row.get(2)?;
    let date = date
        .map(|d| {
            NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                .map_err(|e| conversion_error(2, e.to_string()))
        })
        .transpose()?;

    let classification: Option<String> = row.get(8)?;
    let activity_classification = classification
        .map(|c| {
            ActivityClassification::parse(&c)
                .ok_or_else(|| conversion_error(8, format!("unknown classification {c}")))
        })
        .transpose()?;

    Ok(JournalRecord {
        external_id: row.get(0)?,
        ledger_id: row.get(1)?,
        date,
        description: row.get(3)?,
        amount: row.get(4)?,
        counterparty_name: row.get(5)?,
        counterparty_type: row.get(6)?,
        account_code: row.get(7)?,
        activity_classification,
        non_monetary_basis: row.get(9)?,
        note: row.get(10)?,
        public_subsidy_amount: row.get(11)?,
        content_hash: row.get(12)?,
        is_test: row.get(13)?,
        synced_at: get_ts(row, 14)?,
    })
}

const LEDGER_COLUMNS: &str = "id, ledger_external_id, politician_external_id,
    organization_external_id, election_external_id, fiscal_year, total_income,
    total_expense, entry_count, is_test, first_synced_at, last_updated_at";

fn ledger_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerRecord> {
    Ok(LedgerRecord {
        id: row.get(0)?,
        ledger_external_id: row.get(1)?,
        politician_external_id: row.get(2)?,
        organization_external_id: row.get(3)?,
        election_external_id: row.get(4)?,
        fiscal_year: row.get(5)?,
        total_income: row.get(6)?,
        total_expense: row.get(7)?,
        entry_count: row.get(8)?,
        is_test: row.get(9)?,
        first_synced_at: get_ts(row, 10)?,
        last_updated_at: get_ts(row, 11)?,
    })
}

const UNLOCK_COLUMNS: &str = "id, ledger_id, ledger_type, fiscal_year, requested_by,
    requested_by_email, reason, status, approved_at, approved_by, unlock_expires_at,
    rejection_reason, created_at, updated_at";

fn unlock_from_row(row: &Row<'_>) -> rusqlite::Result<UnlockRequest> {
    let ledger_type: String = row.get(2)?;
    let status: String = row.get(7)?;

    Ok(UnlockRequest {
        id: row.get(0)?,
        ledger_id: row.get(1)?,
        ledger_type: LedgerType::parse(&ledger_type)
            .ok_or_else(|| conversion_error(2, format!("unknown ledger type {ledger_type}")))?,
        fiscal_year: row.get(3)?,
        requested_by: row.get(4)?,
        requested_by_email: row.get(5)?,
        reason: row.get(6)?,
        status: UnlockStatus::parse(&status)
            .ok_or_else(|| conversion_error(7, format!("unknown status {status}")))?,
        approved_at: get_opt_ts(row, 8)?,
        approved_by: row.get(9)?,
        unlock_expires_at: get_opt_ts(row, 10)?,
        rejection_reason: row.get(11)?,
        created_at: get_ts(row, 12)?,
        updated_at: get_ts(row, 13)?,
    })
}

// ============================================================================
// Ledgers
// ============================================================================

impl LedgerRepository for SqliteStore {
    fn resolve_ledger_ids(&self, external_ids: &[String]) -> StoreResult<HashMap<String, String>> {
        if external_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ledger_external_id, id FROM ledgers
             WHERE ledger_external_id IN (SELECT value FROM json_each(?1))",
        )?;

        let map = stmt
            .query_map([id_list(external_ids)?], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<HashMap<String, String>, _>>()?;

        Ok(map)
    }

    fn find_ledger(&self, external_id: &str) -> StoreResult<Option<LedgerRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {LEDGER_COLUMNS} FROM ledgers WHERE ledger_external_id = ?1"),
                [external_id],
                ledger_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_ledger(&self, record: &LedgerRecord) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO ledgers ({LEDGER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                record.id,
                record.ledger_external_id,
                record.politician_external_id,
                record.organization_external_id,
                record.election_external_id,
                record.fiscal_year,
                record.total_income,
                record.total_expense,
                record.entry_count,
                record.is_test,
                ts(&record.first_synced_at),
                ts(&record.last_updated_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UniqueViolation(record.ledger_external_id.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn update_ledger(&self, record: &LedgerRecord) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE ledgers SET
                politician_external_id = ?2,
                organization_external_id = ?3,
                election_external_id = ?4,
                fiscal_year = ?5,
                total_income = ?6,
                total_expense = ?7,
                entry_count = ?8,
                is_test = ?9,
                last_updated_at = ?10
             WHERE ledger_external_id = ?1",
            params![
                record.ledger_external_id,
                record.politician_external_id,
                record.organization_external_id,
                record.election_external_id,
                record.fiscal_year,
                record.total_income,
                record.total_expense,
                record.entry_count,
                record.is_test,
                ts(&record.last_updated_at),
            ],
        )?;
        Ok(changed > 0)
    }

    fn count_ledgers(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledgers", [], |row| row.get(0))?;
        Ok(count)
    }

    fn insert_change_log(&self, log: &ChangeLog) -> StoreResult<()> {
        let details = log
            .change_details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO ledger_change_logs
                (id, ledger_id, changed_at, change_summary, change_details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![log.id, log.ledger_id, ts(&log.changed_at), log.change_summary, details],
        )?;
        Ok(())
    }
}

// ============================================================================
// Journals
// ============================================================================

impl JournalRepository for SqliteStore {
    fn fetch_content_hashes(
        &self,
        external_ids: &[String],
    ) -> StoreResult<HashMap<String, String>> {
        if external_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT external_id, content_hash FROM journals
             WHERE external_id IN (SELECT value FROM json_each(?1))",
        )?;

        let map = stmt
            .query_map([id_list(external_ids)?], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<HashMap<String, String>, _>>()?;

        Ok(map)
    }

    fn insert_journals(&self, rows: &[JournalRecord]) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        // Dropping the transaction without commit rolls every row back
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO journals ({JOURNAL_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ))?;

            for row in rows {
                stmt.execute(params![
                    row.external_id,
                    row.ledger_id,
                    row.date.map(|d| d.format("%Y-%m-%d").to_string()),
                    row.description,
                    row.amount,
                    row.counterparty_name,
                    row.counterparty_type,
                    row.account_code,
                    row.activity_classification.map(|c| c.as_str()),
                    row.non_monetary_basis,
                    row.note,
                    row.public_subsidy_amount,
                    row.content_hash,
                    row.is_test,
                    ts(&row.synced_at),
                ])
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::UniqueViolation(row.external_id.clone())
                    } else {
                        e.into()
                    }
                })?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn update_journal(&self, row: &JournalRecord) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE journals SET
                ledger_id = ?2,
                date = ?3,
                description = ?4,
                amount = ?5,
                counterparty_name = ?6,
                counterparty_type = ?7,
                account_code = ?8,
                activity_classification = ?9,
                non_monetary_basis = ?10,
                note = ?11,
                public_subsidy_amount = ?12,
                content_hash = ?13,
                is_test = ?14,
                synced_at = ?15
             WHERE external_id = ?1",
            params![
                row.external_id,
                row.ledger_id,
                row.date.map(|d| d.format("%Y-%m-%d").to_string()),
                row.description,
                row.amount,
                row.counterparty_name,
                row.counterparty_type,
                row.account_code,
                row.activity_classification.map(|c| c.as_str()),
                row.non_monetary_basis,
                row.note,
                row.public_subsidy_amount,
                row.content_hash,
                row.is_test,
                ts(&row.synced_at),
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_journals(&self, external_ids: &[String]) -> StoreResult<usize> {
        if external_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM journals WHERE external_id IN (SELECT value FROM json_each(?1))",
            [id_list(external_ids)?],
        )?;
        Ok(deleted)
    }

    fn find_journal(&self, external_id: &str) -> StoreResult<Option<JournalRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {JOURNAL_COLUMNS} FROM journals WHERE external_id = ?1"),
                [external_id],
                journal_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn list_journals_for_ledger(&self, ledger_id: &str) -> StoreResult<Vec<JournalRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journals
             WHERE ledger_id = ?1
             ORDER BY date IS NULL, date, external_id"
        ))?;

        let rows = stmt
            .query_map([ledger_id], journal_from_row)?
            .collect::<Result<Vec<JournalRecord>, _>>()?;
        Ok(rows)
    }

    fn count_journals(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM journals", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ============================================================================
// Unlock requests
// ============================================================================

impl UnlockRepository for SqliteStore {
    fn find_pending_request(&self, ledger_id: &str) -> StoreResult<Option<UnlockRequest>> {
        let conn = self.conn()?;
        let request = conn
            .query_row(
                &format!(
                    "SELECT {UNLOCK_COLUMNS} FROM unlock_requests
                     WHERE ledger_id = ?1 AND status = 'pending'"
                ),
                [ledger_id],
                unlock_from_row,
            )
            .optional()?;
        Ok(request)
    }

    fn insert_unlock_request(&self, request: &UnlockRequest) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO unlock_requests ({UNLOCK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                request.id,
                request.ledger_id,
                request.ledger_type.as_str(),
                request.fiscal_year,
                request.requested_by,
                request.requested_by_email,
                request.reason,
                request.status.as_str(),
                request.approved_at.as_ref().map(ts),
                request.approved_by,
                request.unlock_expires_at.as_ref().map(ts),
                request.rejection_reason,
                ts(&request.created_at),
                ts(&request.updated_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UniqueViolation(request.ledger_id.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn get_unlock_request(&self, id: &str) -> StoreResult<Option<UnlockRequest>> {
        let conn = self.conn()?;
        let request = conn
            .query_row(
                &format!("SELECT {UNLOCK_COLUMNS} FROM unlock_requests WHERE id = ?1"),
                [id],
                unlock_from_row,
            )
            .optional()?;
        Ok(request)
    }

    fn list_unlock_requests(&self, filter: &UnlockFilter) -> StoreResult<Vec<UnlockRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {UNLOCK_COLUMNS} FROM unlock_requests
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR ledger_id = ?2)
               AND (?3 IS NULL OR ledger_type = ?3)
             ORDER BY created_at DESC"
        ))?;

        let requests = stmt
            .query_map(
                params![
                    filter.status.map(|s| s.as_str()),
                    filter.ledger_id,
                    filter.ledger_type.map(|t| t.as_str()),
                ],
                unlock_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    fn record_decision(&self, request: &UnlockRequest) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE unlock_requests SET
                status = ?2,
                approved_at = ?3,
                approved_by = ?4,
                unlock_expires_at = ?5,
                rejection_reason = ?6,
                updated_at = ?7
             WHERE id = ?1 AND status = 'pending'",
            params![
                request.id,
                request.status.as_str(),
                request.approved_at.as_ref().map(ts),
                request.approved_by,
                request.unlock_expires_at.as_ref().map(ts),
                request.rejection_reason,
                ts(&request.updated_at),
            ],
        )?;
        Ok(changed > 0)
    }
}
