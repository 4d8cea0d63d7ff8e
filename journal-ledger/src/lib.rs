//! Ledger client abstraction for the journal record store.
//!
//! [`LedgerClient`] is the single boundary to the remote program: list
//! entries, fetch one entry, submit create/update/delete, and probe whether
//! the program itself is deployed under a scope. The wire protocol belongs
//! to the ledger, not to this crate — integrators implement the trait over
//! their transport; [`MemoryLedger`] implements it in-process for tests and
//! local development.
//!
//! # Submission semantics
//!
//! All mutating calls are at-most-once submissions from the client's point
//! of view: nothing here retries. A `Transport` error on a submission means
//! the remote outcome is unknown — callers must re-query before retrying,
//! or they risk duplicate side effects.

pub mod memory;

pub use memory::MemoryLedger;

use async_trait::async_trait;
use journal_core::{JournalEntry, Result, Scope, StorageAddress};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;

/// Opaque confirmation token returned by a successful mutation.
///
/// Usable for user-facing acknowledgement display only; the core never
/// interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationReceipt(String);

impl OperationReceipt {
    /// Wrap a ledger-issued confirmation token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote program boundary: all I/O against the record store goes through
/// this trait.
///
/// Read operations treat absence as data (`Ok(None)`, empty `Vec`), never as
/// an error — an `Err` from a read is a transport or ledger fault. Mutations
/// return the typed failures of the shared taxonomy: `AlreadyExists` and
/// `NotFound` are ledger-enforced outcomes, `RejectedByLedger` is a semantic
/// refusal, `Transport` is a communication failure with unknown outcome.
#[async_trait]
pub trait LedgerClient: Debug + Send + Sync {
    /// Fetch every entry visible under the scope. May be empty.
    async fn list_all(&self, scope: Scope) -> Result<Vec<(StorageAddress, JournalEntry)>>;

    /// Fetch a single entry by derived address.
    ///
    /// `Ok(None)` means the address holds no record — distinct from a
    /// transport failure.
    async fn fetch_one(
        &self,
        scope: Scope,
        address: &StorageAddress,
    ) -> Result<Option<JournalEntry>>;

    /// Submit entry creation. Fails with `AlreadyExists` if the address is
    /// occupied (ledger-enforced, not client-enforced).
    async fn submit_create(
        &self,
        scope: Scope,
        address: &StorageAddress,
        entry: &JournalEntry,
    ) -> Result<OperationReceipt>;

    /// Submit an entry update. Fails with `NotFound` if the address holds no
    /// record.
    async fn submit_update(
        &self,
        scope: Scope,
        address: &StorageAddress,
        entry: &JournalEntry,
    ) -> Result<OperationReceipt>;

    /// Submit entry deletion. Fails with `NotFound` if the address holds no
    /// record.
    async fn submit_delete(
        &self,
        scope: Scope,
        address: &StorageAddress,
    ) -> Result<OperationReceipt>;

    /// Whether the record-store program itself is deployed/reachable under
    /// this scope. Distinct from any individual record's existence.
    async fn probe_program(&self, scope: Scope) -> Result<bool>;
}
