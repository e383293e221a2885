// Hub Sync - Core Library
// Reconciliation engine that mirrors Source's disclosure ledgers into the hub.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod config;
pub mod entities;
pub mod error;
pub mod hash;
pub mod import;
pub mod lock;
pub mod store;
pub mod sync;
pub mod validation;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::HubConfig;
pub use entities::{
    ActivityClassification, ChangeLog, ChangeLogInput, JournalEntry, JournalEntryInput,
    JournalRecord, LedgerInput, LedgerRecord, LedgerSummary, LedgerType, OwnerLink,
    UnlockFilter, UnlockRequest, UnlockStatus, UpsertAction,
};
pub use error::{FieldError, HubError, HubResult, StoreError, StoreResult};
pub use hash::canonical_content_hash;
pub use import::{load_journal_csv, load_ledger_json};
pub use lock::{LockCheck, LockState, UnlockService};
pub use store::{
    JournalRepository, LedgerRepository, MemoryStore, SqliteStore, UnlockRepository,
};
pub use sync::{SyncEngine, SyncResult, SyncStats};
pub use validation::{validate_batch, validate_raw_batch};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "info,hub_sync=debug";
