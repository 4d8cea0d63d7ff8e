//! Journal entry records and submission payloads.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Maximum byte length of an entry message, enforced by the on-ledger
/// program (account space is fixed at creation).
pub const MAX_MESSAGE_LEN: usize = 1000;

/// A journal entry as stored on the ledger.
///
/// `(owner, title)` is the logical key and determines the entry's storage
/// address; `message` is the only mutable field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Identity of the writer
    pub owner: Identity,
    /// Stable logical key, also a derivation seed
    pub title: String,
    /// Mutable entry body
    pub message: String,
}

impl JournalEntry {
    /// Create a new entry record.
    pub fn new(owner: Identity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            owner,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Caller-supplied payload for create/update submissions.
///
/// The owner is threaded separately (it comes from the wallet collaborator,
/// revalidated on every call), so the payload carries only the record data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryArgs {
    /// Logical key of the entry
    pub title: String,
    /// Entry body
    pub message: String,
}

impl EntryArgs {
    /// Create a submission payload.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}
