//! Error types shared across the journal client crates.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for journal operations.
///
/// Each variant carries a retry-safety classification that callers need for
/// user-facing reporting:
///
/// - "didn't happen": [`Encoding`](Error::Encoding),
///   [`RejectedByLedger`](Error::RejectedByLedger) — nothing was submitted
///   or the ledger refused; retrying the same input will fail the same way.
/// - "unknown outcome": [`Transport`](Error::Transport) during a submission —
///   the operation may or may not have taken effect remotely; callers must
///   re-query before retrying to avoid duplicate side effects.
/// - "already true": [`NotFound`](Error::NotFound),
///   [`AlreadyExists`](Error::AlreadyExists) — expected states, not faults.
/// - "try again later": [`MutationInFlight`](Error::MutationInFlight) — a
///   mutation with the same key is still pending; a conflict, not a fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Input cannot be represented in the byte encoding the address
    /// derivation scheme expects
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Network / communication failure; no ledger-side effect may be inferred
    #[error("Transport error: {0}")]
    Transport(String),

    /// Expected absence (record or account does not exist)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write collision: the derived address is already occupied
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The remote program refused the operation semantically
    #[error("Rejected by ledger: {0}")]
    RejectedByLedger(String),

    /// A mutation with the same key is already pending
    #[error("Mutation already in flight: {0}")]
    MutationInFlight(String),
}

impl Error {
    /// Create an encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        Error::Encoding(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an already exists error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Error::AlreadyExists(msg.into())
    }

    /// Create a rejected-by-ledger error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Error::RejectedByLedger(msg.into())
    }

    /// Create a mutation-in-flight error
    pub fn mutation_in_flight(msg: impl Into<String>) -> Self {
        Error::MutationInFlight(msg.into())
    }

    /// Whether retrying the same call can succeed without changing the input.
    ///
    /// `MutationInFlight` is retryable once the pending mutation settles.
    pub fn retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::MutationInFlight(_))
    }

    /// Whether the remote side may have applied the operation despite the
    /// error. Only transport failures leave the outcome unknown; everything
    /// else is a definite "didn't happen" or "already true".
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
