//! Core types for the journal record store client.
//!
//! A journal entry is a short text record addressed by a deterministic
//! derived address rather than a server-issued id: given `(owner, title)`
//! and the program namespace for the current scope, any client can
//! recompute where the entry lives. This crate holds the pure pieces —
//! identities, address derivation, record shapes, scopes, and the shared
//! error taxonomy. It performs no I/O.

pub mod address;
pub mod error;
pub mod identity;
pub mod record;
pub mod scope;

pub use address::{derive_entry_address, StorageAddress, ADDRESS_LEN, MAX_SEED_LEN};
pub use error::{Error, Result};
pub use identity::{Identity, IDENTITY_LEN};
pub use record::{EntryArgs, JournalEntry, MAX_MESSAGE_LEN};
pub use scope::Scope;
