//! Mutation coordination and cached reads over a [`LedgerClient`].
//!
//! [`MutationCoordinator`] is the account-access layer a UI or CLI talks to.
//! Reads go through a [`RecordCache`] keyed by query identity; writes follow
//! a fixed pipeline:
//!
//! 1. derive the entry's storage address from `(owner, title)` and the
//!    scope's program namespace — encoding failures stop here, before any I/O;
//! 2. submit the mutation through the ledger client;
//! 3. on success only, invalidate the cached queries the write made stale
//!    and emit a [`SyncEvent`] for subscribers.
//!
//! A failed submission invalidates nothing: the cache still reflects the
//! last confirmed ledger state, which is exactly what the failure left
//! behind. At most one mutation of a given kind may be in flight per scope;
//! a second concurrent attempt fails fast with `MutationInFlight` instead
//! of queueing.

use journal_cache::{QueryKey, QueryValue, RecordCache};
use journal_core::{
    derive_entry_address, EntryArgs, Error, Identity, JournalEntry, Result, Scope, StorageAddress,
};
use journal_ledger::{LedgerClient, OperationReceipt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// The kind of mutation being submitted.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concurrency unit for pending-mutation gating.
///
/// Gating is per `(kind, scope)`: a create on devnet does not block an
/// update on devnet, nor a create on mainnet.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct MutationKey {
    kind: MutationKind,
    scope: Scope,
}

/// Clears the pending flag when the mutation attempt ends, success or not.
struct PendingGuard {
    pending: Arc<Mutex<HashSet<MutationKey>>>,
    key: MutationKey,
}

impl PendingGuard {
    /// Claim the `(kind, scope)` slot, or fail with `MutationInFlight` if a
    /// mutation of that kind is already pending on the scope.
    fn acquire(pending: &Arc<Mutex<HashSet<MutationKey>>>, key: MutationKey) -> Result<Self> {
        let mut set = pending.lock();
        if !set.insert(key) {
            return Err(Error::mutation_in_flight(format!(
                "{} already pending on {}",
                key.kind, key.scope
            )));
        }
        Ok(Self {
            pending: Arc::clone(pending),
            key,
        })
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}

/// Broadcast notification of a confirmed mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    EntryCreated {
        scope: Scope,
        address: StorageAddress,
        receipt: OperationReceipt,
    },
    EntryUpdated {
        scope: Scope,
        address: StorageAddress,
        receipt: OperationReceipt,
    },
    EntryDeleted {
        scope: Scope,
        address: StorageAddress,
        receipt: OperationReceipt,
    },
}

impl SyncEvent {
    /// Address the event concerns.
    pub fn address(&self) -> &StorageAddress {
        match self {
            SyncEvent::EntryCreated { address, .. }
            | SyncEvent::EntryUpdated { address, .. }
            | SyncEvent::EntryDeleted { address, .. } => address,
        }
    }
}

/// Result of a confirmed mutation: where the record lives and the ledger's
/// confirmation token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationOutcome {
    pub address: StorageAddress,
    pub receipt: OperationReceipt,
}

/// Capacity of the sync event channel; laggy subscribers lose old events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Account-access coordinator: cached reads plus gated mutations.
pub struct MutationCoordinator<L> {
    client: Arc<L>,
    cache: Arc<RecordCache>,
    pending: Arc<Mutex<HashSet<MutationKey>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl<L> fmt::Debug for MutationCoordinator<L>
where
    L: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("client", &self.client)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<L> Clone for MutationCoordinator<L> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            cache: Arc::clone(&self.cache),
            pending: Arc::clone(&self.pending),
            events: self.events.clone(),
        }
    }
}

impl<L: LedgerClient> MutationCoordinator<L> {
    /// Build a coordinator over a ledger client and a query cache.
    pub fn new(client: Arc<L>, cache: Arc<RecordCache>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            cache,
            pending: Arc::new(Mutex::new(HashSet::new())),
            events,
        }
    }

    /// The query cache shared by reads and write invalidation.
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Subscribe to confirmed-mutation notifications.
    ///
    /// Only successful mutations emit; a failed submission is silent.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Derived storage address for an `(owner, title)` pair under a scope.
    ///
    /// Pure and offline: callers can locate records they have not created.
    pub fn entry_address(
        &self,
        scope: Scope,
        owner: &Identity,
        title: &str,
    ) -> Result<StorageAddress> {
        derive_entry_address(owner, title, &scope.program_namespace())
    }

    // --- reads -----------------------------------------------------------

    /// Every entry under the scope, read through the cache.
    pub async fn all_entries(&self, scope: Scope) -> Result<Vec<(StorageAddress, JournalEntry)>> {
        let key = QueryKey::all_entries(scope);
        let client = Arc::clone(&self.client);
        let value = self
            .cache
            .get_or_fetch(&key, move || async move {
                client.list_all(scope).await.map(QueryValue::Records)
            })
            .await?;
        match value {
            QueryValue::Records(records) => Ok(records),
            _ => Err(self.shape_mismatch(&key)),
        }
    }

    /// One entry by derived address, read through the cache.
    ///
    /// `Ok(None)` means the address holds no record; absence is cached like
    /// any other answer.
    pub async fn entry(
        &self,
        scope: Scope,
        address: &StorageAddress,
    ) -> Result<Option<JournalEntry>> {
        let key = QueryKey::entry(scope, *address);
        let client = Arc::clone(&self.client);
        let address = *address;
        let value = self
            .cache
            .get_or_fetch(&key, move || async move {
                client
                    .fetch_one(scope, &address)
                    .await
                    .map(QueryValue::Record)
            })
            .await?;
        match value {
            QueryValue::Record(record) => Ok(record),
            _ => Err(self.shape_mismatch(&key)),
        }
    }

    /// One entry located by `(owner, title)` instead of address.
    pub async fn entry_by_title(
        &self,
        scope: Scope,
        owner: &Identity,
        title: &str,
    ) -> Result<Option<JournalEntry>> {
        let address = self.entry_address(scope, owner, title)?;
        self.entry(scope, &address).await
    }

    /// Whether the record-store program is deployed under the scope, read
    /// through the cache.
    pub async fn program_deployed(&self, scope: Scope) -> Result<bool> {
        let key = QueryKey::program_probe(scope);
        let client = Arc::clone(&self.client);
        let value = self
            .cache
            .get_or_fetch(&key, move || async move {
                client.probe_program(scope).await.map(QueryValue::Probe)
            })
            .await?;
        match value {
            QueryValue::Probe(deployed) => Ok(deployed),
            _ => Err(self.shape_mismatch(&key)),
        }
    }

    // --- writes ----------------------------------------------------------

    /// Create an entry owned by `owner` under `scope`.
    ///
    /// The address is derived, never chosen; creation at an occupied address
    /// fails with `AlreadyExists` from the ledger.
    pub async fn create_entry(
        &self,
        scope: Scope,
        owner: &Identity,
        args: &EntryArgs,
    ) -> Result<MutationOutcome> {
        let _guard = self.claim(MutationKind::Create, scope)?;
        let address = self.entry_address(scope, owner, &args.title)?;
        let entry = JournalEntry::new(*owner, args.title.clone(), args.message.clone());

        let receipt = self.client.submit_create(scope, &address, &entry).await?;
        self.confirm(
            scope,
            address,
            SyncEvent::EntryCreated {
                scope,
                address,
                receipt: receipt.clone(),
            },
        );
        Ok(MutationOutcome { address, receipt })
    }

    /// Replace the message of an existing entry. The title is the lookup
    /// key and cannot change; retitling is delete-then-create.
    pub async fn update_entry(
        &self,
        scope: Scope,
        owner: &Identity,
        args: &EntryArgs,
    ) -> Result<MutationOutcome> {
        let _guard = self.claim(MutationKind::Update, scope)?;
        let address = self.entry_address(scope, owner, &args.title)?;
        let entry = JournalEntry::new(*owner, args.title.clone(), args.message.clone());

        let receipt = self.client.submit_update(scope, &address, &entry).await?;
        self.confirm(
            scope,
            address,
            SyncEvent::EntryUpdated {
                scope,
                address,
                receipt: receipt.clone(),
            },
        );
        Ok(MutationOutcome { address, receipt })
    }

    /// Delete the entry identified by `(owner, title)`.
    pub async fn delete_entry(
        &self,
        scope: Scope,
        owner: &Identity,
        title: &str,
    ) -> Result<MutationOutcome> {
        let _guard = self.claim(MutationKind::Delete, scope)?;
        let address = self.entry_address(scope, owner, title)?;

        let receipt = self.client.submit_delete(scope, &address).await?;
        self.confirm(
            scope,
            address,
            SyncEvent::EntryDeleted {
                scope,
                address,
                receipt: receipt.clone(),
            },
        );
        Ok(MutationOutcome { address, receipt })
    }

    fn claim(&self, kind: MutationKind, scope: Scope) -> Result<PendingGuard> {
        PendingGuard::acquire(&self.pending, MutationKey { kind, scope })
    }

    /// The cache handle is shared, so another populator can leave a key
    /// holding the wrong value shape. Surface that as a typed error and
    /// drop the entry so the next read refetches cleanly.
    fn shape_mismatch(&self, key: &QueryKey) -> Error {
        self.cache.invalidate(key);
        Error::encoding(format!("cached value has unexpected shape for {key:?}"))
    }

    /// Post-confirmation bookkeeping: invalidate the queries the write made
    /// stale and notify subscribers. Runs only after a ledger success.
    fn confirm(&self, scope: Scope, address: StorageAddress, event: SyncEvent) {
        debug!(%scope, %address, "mutation confirmed");
        self.cache.invalidate_write(scope, &address);
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
