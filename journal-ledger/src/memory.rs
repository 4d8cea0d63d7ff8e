//! In-memory ledger implementation for tests and local development.
//!
//! Stores entries per scope in a `HashMap` behind `Arc<RwLock>` and enforces
//! the same outcomes the remote program would: `AlreadyExists` on create
//! collisions, `NotFound` on update/delete of absent addresses, and
//! `RejectedByLedger` on payloads that exceed the program's size caps.
//!
//! Two test hooks model remote misbehavior:
//! - a fault plan ([`fail_next_submissions`](MemoryLedger::fail_next_submissions))
//!   makes upcoming submissions return `Transport` errors, optionally after
//!   applying the mutation — the "unknown outcome" case;
//! - a submission gate ([`hold_submissions`](MemoryLedger::hold_submissions))
//!   parks submissions until released, so tests can observe concurrent
//!   behavior while a call is mid-flight.

use crate::{LedgerClient, OperationReceipt};
use async_trait::async_trait;
use journal_core::{Error, JournalEntry, Result, Scope, StorageAddress, MAX_MESSAGE_LEN, MAX_SEED_LEN};
use parking_lot::RwLock;
use sha2::Digest;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Pending transport-fault plan for upcoming submissions.
struct FaultPlan {
    /// How many upcoming submissions fail with `Transport`
    failures_remaining: u32,
    /// Whether the mutation is applied anyway before the error is returned
    /// (models a submission that reached the ledger but whose confirmation
    /// was lost)
    apply_anyway: bool,
}

/// In-memory ledger for testing
#[derive(Clone)]
pub struct MemoryLedger {
    /// Entries keyed by scope, then by derived address
    entries: Arc<RwLock<HashMap<Scope, HashMap<StorageAddress, JournalEntry>>>>,
    /// Scopes where the record-store program is "deployed"
    deployed: Arc<RwLock<HashSet<Scope>>>,
    /// Monotonic submission counter, part of every receipt
    submissions: Arc<AtomicU64>,
    fault_plan: Arc<RwLock<FaultPlan>>,
    /// When set, submissions wait here until the sender flips to `true`
    gate: Arc<RwLock<Option<watch::Receiver<bool>>>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            deployed: Arc::new(RwLock::new(HashSet::new())),
            submissions: Arc::new(AtomicU64::new(0)),
            fault_plan: Arc::new(RwLock::new(FaultPlan {
                failures_remaining: 0,
                apply_anyway: false,
            })),
            gate: Arc::new(RwLock::new(None)),
        }
    }
}

impl Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let total: usize = entries.values().map(|m| m.len()).sum();
        f.debug_struct("MemoryLedger")
            .field("scopes", &entries.len())
            .field("entry_count", &total)
            .field("submissions", &self.submissions.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryLedger {
    /// Create an empty ledger with no program deployed anywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger with the program deployed on the given scope.
    pub fn deployed_on(scope: Scope) -> Self {
        let ledger = Self::default();
        ledger.deploy(scope);
        ledger
    }

    /// Mark the program as deployed on a scope (affects `probe_program`).
    pub fn deploy(&self, scope: Scope) {
        self.deployed.write().insert(scope);
    }

    /// Total submissions attempted so far (including faulted ones).
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Make the next `n` submissions fail with a `Transport` error.
    ///
    /// With `apply_anyway`, the mutation takes effect before the error is
    /// returned, modeling a lost confirmation.
    pub fn fail_next_submissions(&self, n: u32, apply_anyway: bool) {
        let mut plan = self.fault_plan.write();
        plan.failures_remaining = n;
        plan.apply_anyway = apply_anyway;
    }

    /// Hold all submissions until `true` is sent on the returned channel.
    ///
    /// Dropping the sender also releases held submissions.
    pub fn hold_submissions(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.gate.write() = Some(rx);
        tx
    }

    async fn wait_gate(&self) {
        let rx = self.gate.read().clone();
        if let Some(mut rx) = rx {
            while !*rx.borrow() {
                // Sender dropped counts as released.
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    /// Take one fault from the plan, if any. Returns the `apply_anyway` flag.
    fn take_fault(&self) -> Option<bool> {
        let mut plan = self.fault_plan.write();
        if plan.failures_remaining == 0 {
            return None;
        }
        plan.failures_remaining -= 1;
        Some(plan.apply_anyway)
    }

    fn validate_payload(entry: &JournalEntry) -> Result<()> {
        if entry.title.len() > MAX_SEED_LEN {
            return Err(Error::rejected(format!(
                "title exceeds {MAX_SEED_LEN} bytes"
            )));
        }
        if entry.message.len() > MAX_MESSAGE_LEN {
            return Err(Error::rejected(format!(
                "message exceeds {MAX_MESSAGE_LEN} bytes"
            )));
        }
        Ok(())
    }

    /// Mint a deterministic receipt for the current submission.
    ///
    /// Hashes the operation kind, scope, address, and the submission counter
    /// so that identical submission sequences yield identical receipts.
    fn mint_receipt(&self, op: &str, scope: Scope, address: &StorageAddress) -> OperationReceipt {
        let seq = self.submissions.fetch_add(1, Ordering::Relaxed);
        let mut hasher = sha2::Sha256::new();
        hasher.update(op.as_bytes());
        hasher.update(scope.as_str().as_bytes());
        hasher.update(address.as_bytes());
        hasher.update(seq.to_be_bytes());
        OperationReceipt::new(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn list_all(&self, scope: Scope) -> Result<Vec<(StorageAddress, JournalEntry)>> {
        let entries = self.entries.read();
        let mut records: Vec<(StorageAddress, JournalEntry)> = entries
            .get(&scope)
            .map(|m| m.iter().map(|(a, e)| (*a, e.clone())).collect())
            .unwrap_or_default();
        // Deterministic listing order for callers and tests.
        records.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(records)
    }

    async fn fetch_one(
        &self,
        scope: Scope,
        address: &StorageAddress,
    ) -> Result<Option<JournalEntry>> {
        Ok(self
            .entries
            .read()
            .get(&scope)
            .and_then(|m| m.get(address))
            .cloned())
    }

    async fn submit_create(
        &self,
        scope: Scope,
        address: &StorageAddress,
        entry: &JournalEntry,
    ) -> Result<OperationReceipt> {
        self.wait_gate().await;
        Self::validate_payload(entry)?;
        let receipt = self.mint_receipt("create", scope, address);

        let fault = self.take_fault();
        if matches!(fault, Some(false)) {
            return Err(Error::transport("submission lost before reaching ledger"));
        }

        {
            let mut entries = self.entries.write();
            let scoped = entries.entry(scope).or_default();
            if scoped.contains_key(address) {
                return Err(Error::already_exists(address.to_string()));
            }
            scoped.insert(*address, entry.clone());
        }

        if fault.is_some() {
            return Err(Error::transport("confirmation lost after submission"));
        }

        debug!(%scope, %address, "created journal entry");
        Ok(receipt)
    }

    async fn submit_update(
        &self,
        scope: Scope,
        address: &StorageAddress,
        entry: &JournalEntry,
    ) -> Result<OperationReceipt> {
        self.wait_gate().await;
        Self::validate_payload(entry)?;
        let receipt = self.mint_receipt("update", scope, address);

        let fault = self.take_fault();
        if matches!(fault, Some(false)) {
            return Err(Error::transport("submission lost before reaching ledger"));
        }

        {
            let mut entries = self.entries.write();
            let existing = entries
                .get_mut(&scope)
                .and_then(|m| m.get_mut(address))
                .ok_or_else(|| Error::not_found(address.to_string()))?;
            *existing = entry.clone();
        }

        if fault.is_some() {
            return Err(Error::transport("confirmation lost after submission"));
        }

        debug!(%scope, %address, "updated journal entry");
        Ok(receipt)
    }

    async fn submit_delete(
        &self,
        scope: Scope,
        address: &StorageAddress,
    ) -> Result<OperationReceipt> {
        self.wait_gate().await;
        let receipt = self.mint_receipt("delete", scope, address);

        let fault = self.take_fault();
        if matches!(fault, Some(false)) {
            return Err(Error::transport("submission lost before reaching ledger"));
        }

        {
            let mut entries = self.entries.write();
            let removed = entries.get_mut(&scope).and_then(|m| m.remove(address));
            if removed.is_none() {
                return Err(Error::not_found(address.to_string()));
            }
        }

        if fault.is_some() {
            return Err(Error::transport("confirmation lost after submission"));
        }

        debug!(%scope, %address, "deleted journal entry");
        Ok(receipt)
    }

    async fn probe_program(&self, scope: Scope) -> Result<bool> {
        Ok(self.deployed.read().contains(&scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::{derive_entry_address, Identity};

    const SCOPE: Scope = Scope::Localnet;

    fn entry(title: &str, message: &str) -> (StorageAddress, JournalEntry) {
        let owner = Identity::from_seed(b"owner");
        let program = SCOPE.program_namespace();
        let address = derive_entry_address(&owner, title, &program).unwrap();
        (address, JournalEntry::new(owner, title, message))
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let ledger = MemoryLedger::new();
        let (address, record) = entry("T", "M");

        ledger.submit_create(SCOPE, &address, &record).await.unwrap();
        let fetched = ledger.fetch_one(SCOPE, &address).await.unwrap();
        assert_eq!(fetched, Some(record));
    }

    #[tokio::test]
    async fn test_create_collision_is_already_exists() {
        let ledger = MemoryLedger::new();
        let (address, record) = entry("T", "M");

        ledger.submit_create(SCOPE, &address, &record).await.unwrap();
        let err = ledger
            .submit_create(SCOPE, &address, &record)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_absent_is_not_found() {
        let ledger = MemoryLedger::new();
        let (address, record) = entry("T", "M");

        let err = ledger
            .submit_update(SCOPE, &address, &record)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_then_fetch_absent() {
        let ledger = MemoryLedger::new();
        let (address, record) = entry("T", "M");

        ledger.submit_create(SCOPE, &address, &record).await.unwrap();
        ledger.submit_delete(SCOPE, &address).await.unwrap();

        assert_eq!(ledger.fetch_one(SCOPE, &address).await.unwrap(), None);
        let err = ledger.submit_delete(SCOPE, &address).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let ledger = MemoryLedger::new();
        let (address, mut record) = entry("T", "M");
        record.message = "m".repeat(MAX_MESSAGE_LEN + 1);

        let err = ledger
            .submit_create(SCOPE, &address, &record)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RejectedByLedger(_)));
        // Rejected submissions leave no record behind.
        assert_eq!(ledger.fetch_one(SCOPE, &address).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_receipts_deterministic_across_identical_histories() {
        let (address, record) = entry("T", "M");

        let mut receipts = Vec::new();
        for _ in 0..2 {
            let ledger = MemoryLedger::new();
            let r1 = ledger.submit_create(SCOPE, &address, &record).await.unwrap();
            let r2 = ledger.submit_update(SCOPE, &address, &record).await.unwrap();
            assert_ne!(r1, r2);
            receipts.push((r1, r2));
        }
        assert_eq!(receipts[0], receipts[1]);
    }

    #[tokio::test]
    async fn test_fault_without_apply_leaves_ledger_unchanged() {
        let ledger = MemoryLedger::new();
        let (address, record) = entry("T", "M");

        ledger.fail_next_submissions(1, false);
        let err = ledger
            .submit_create(SCOPE, &address, &record)
            .await
            .unwrap_err();
        assert!(err.outcome_unknown());
        assert_eq!(ledger.fetch_one(SCOPE, &address).await.unwrap(), None);

        // Plan exhausted — next submission succeeds.
        ledger.submit_create(SCOPE, &address, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_fault_with_apply_models_lost_confirmation() {
        let ledger = MemoryLedger::new();
        let (address, record) = entry("T", "M");

        ledger.fail_next_submissions(1, true);
        let err = ledger
            .submit_create(SCOPE, &address, &record)
            .await
            .unwrap_err();
        assert!(err.outcome_unknown());
        // The mutation took effect even though the caller saw an error.
        assert_eq!(
            ledger.fetch_one(SCOPE, &address).await.unwrap(),
            Some(record)
        );
    }

    #[tokio::test]
    async fn test_probe_program() {
        let ledger = MemoryLedger::new();
        assert!(!ledger.probe_program(SCOPE).await.unwrap());

        ledger.deploy(SCOPE);
        assert!(ledger.probe_program(SCOPE).await.unwrap());
        assert!(!ledger.probe_program(Scope::Devnet).await.unwrap());
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let ledger = MemoryLedger::new();
        let (address, record) = entry("T", "M");

        ledger.submit_create(SCOPE, &address, &record).await.unwrap();
        assert!(ledger.list_all(Scope::Devnet).await.unwrap().is_empty());
        assert_eq!(ledger.list_all(SCOPE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_sorted_by_address() {
        let ledger = MemoryLedger::new();
        for title in ["a", "b", "c", "d"] {
            let (address, record) = entry(title, "M");
            ledger.submit_create(SCOPE, &address, &record).await.unwrap();
        }

        let listed = ledger.list_all(SCOPE).await.unwrap();
        let mut sorted = listed.clone();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
        assert_eq!(listed, sorted);
    }
}
