// Entity Models
//
// Each entity has:
// - A natural key assigned by Source (external_id)
// - An internal identity where other rows need a stable foreign key (UUID)
// - Wire input types that tolerate missing fields, validated into domain types

pub mod journal;
pub mod ledger;
pub mod unlock;

pub use journal::{ActivityClassification, JournalEntry, JournalEntryInput, JournalRecord};
pub use ledger::{
    ChangeLog, ChangeLogInput, LedgerInput, LedgerRecord, LedgerSummary, OwnerLink, UpsertAction,
};
pub use unlock::{
    ApproveInput, LedgerType, NewUnlockRequestInput, RejectInput, UnlockFilter, UnlockRequest,
    UnlockStatus,
};
