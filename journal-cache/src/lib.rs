//! Read-through query cache for the journal record store.
//!
//! Queries are keyed by their full identity — scope plus query kind plus
//! optional address — and resolved values are memoized until explicitly
//! invalidated (or until an optional staleness window lapses). Two rules
//! keep the cache honest:
//!
//! - only successful reads populate the cache; a fetch error is returned to
//!   the caller and retried on the next `get_or_fetch`;
//! - invalidation always forces a full refetch — entries are never patched
//!   in place, so the cache cannot diverge from ledger truth after a write.
//!
//! Concurrent `get_or_fetch` calls for the same unresolved key coalesce into
//! a single underlying fetch; independent keys never block each other.

use journal_core::{JournalEntry, Result, Scope, StorageAddress};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// What a query asks for.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum QueryKind {
    /// Every entry visible under the scope
    AllEntries,
    /// One entry by derived address
    Entry(StorageAddress),
    /// Whether the record-store program is deployed under the scope
    ProgramProbe,
}

/// Composite query identity: the cache key.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct QueryKey {
    /// Scope the query runs under
    pub scope: Scope,
    /// What is being asked
    pub kind: QueryKind,
}

impl QueryKey {
    /// Key for the scope's full entry listing.
    pub fn all_entries(scope: Scope) -> Self {
        Self {
            scope,
            kind: QueryKind::AllEntries,
        }
    }

    /// Key for a single entry fetch.
    pub fn entry(scope: Scope, address: StorageAddress) -> Self {
        Self {
            scope,
            kind: QueryKind::Entry(address),
        }
    }

    /// Key for the program existence probe.
    pub fn program_probe(scope: Scope) -> Self {
        Self {
            scope,
            kind: QueryKind::ProgramProbe,
        }
    }
}

/// A resolved query result.
///
/// Cached absence is data: an empty listing and a `Record(None)` are valid
/// entries, distinct from "not yet fetched".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
    /// Result of an all-entries listing
    Records(Vec<(StorageAddress, JournalEntry)>),
    /// Result of a single-entry fetch (`None` = no record at that address)
    Record(Option<JournalEntry>),
    /// Result of a program existence probe
    Probe(bool),
}

/// Cache statistics snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Number of cache hits (ready + coalesced)
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Hits served instantly from a resolved entry
    pub ready_hits: u64,
    /// Hits that waited on another caller's in-flight fetch
    pub inflight_hits: u64,
    /// Entries removed by explicit invalidation
    pub invalidations: u64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
}

/// Cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of entries before resolved entries are evicted
    pub max_entries: usize,
    /// Optional staleness window: entries older than this refetch on the
    /// next `get_or_fetch`. `None` means entries live until invalidated.
    pub staleness: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            staleness: None,
        }
    }
}

impl CacheConfig {
    /// Config with an explicit entry cap and no staleness window.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// Config with a staleness window.
    pub fn with_staleness(staleness: Duration) -> Self {
        Self {
            staleness: Some(staleness),
            ..Self::default()
        }
    }
}

/// Shared slot for an in-flight fetch. `None` while fetching, `Some` once
/// the fetcher has stored its result for waiters.
type InFlightSlot = Arc<futures::lock::Mutex<Option<Result<QueryValue>>>>;

/// Entry state: resolved value or a fetch in progress.
enum CacheEntry {
    Ready {
        value: QueryValue,
        fetched_at: Instant,
    },
    /// Waiters share the fetcher's slot mutex
    InFlight(InFlightSlot),
}

impl Clone for CacheEntry {
    fn clone(&self) -> Self {
        match self {
            CacheEntry::Ready { value, fetched_at } => CacheEntry::Ready {
                value: value.clone(),
                fetched_at: *fetched_at,
            },
            CacheEntry::InFlight(slot) => CacheEntry::InFlight(slot.clone()),
        }
    }
}

/// Read-through cache over the ledger client, scoped by query identity.
///
/// **Deduplication**: concurrent requests for the same unresolved key share
/// one underlying fetch. **Error policy**: fetch errors are never cached —
/// the in-flight entry is removed so the next caller retries.
pub struct RecordCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    config: CacheConfig,
    stats: RwLock<CacheStats>,
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("len", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl RecordCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> CacheStats {
        *self.stats.read()
    }

    /// Get a query result from cache, or fetch and cache it.
    ///
    /// `fetch` runs only when the key is unresolved (or its entry has aged
    /// past the staleness window); concurrent callers for the same key wait
    /// on the one in-flight fetch instead of issuing their own.
    pub async fn get_or_fetch<F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<QueryValue>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<QueryValue>> + Send,
    {
        // `fetch` is FnOnce, but an orphaned in-flight entry (fetcher dropped
        // before completing) forces a retry of the lookup. Keep it in an
        // Option so it is still called exactly once when we are the fetcher.
        let mut fetch = Some(fetch);

        enum Action {
            Hit(QueryValue),
            WaitOnInFlight(InFlightSlot),
            DoFetch(InFlightSlot),
        }

        loop {
            let action = {
                let mut entries = self.entries.write();

                let expired = match entries.get(key) {
                    Some(CacheEntry::Ready { fetched_at, .. }) => match self.config.staleness {
                        Some(window) => fetched_at.elapsed() > window,
                        None => false,
                    },
                    _ => false,
                };
                if expired {
                    entries.remove(key);
                }

                match entries.get(key) {
                    Some(CacheEntry::Ready { value, .. }) => {
                        let mut stats = self.stats.write();
                        stats.hits += 1;
                        stats.ready_hits += 1;
                        Action::Hit(value.clone())
                    }
                    Some(CacheEntry::InFlight(slot)) => {
                        // Another caller is fetching — wait on the same slot.
                        let mut stats = self.stats.write();
                        stats.hits += 1;
                        stats.inflight_hits += 1;
                        Action::WaitOnInFlight(slot.clone())
                    }
                    None => {
                        let mut stats = self.stats.write();
                        stats.misses += 1;

                        // Evict a resolved entry if at capacity; in-flight
                        // entries are never evicted.
                        if entries.len() >= self.config.max_entries {
                            let ready_key = entries
                                .iter()
                                .find(|(_, v)| matches!(v, CacheEntry::Ready { .. }))
                                .map(|(k, _)| *k);
                            if let Some(old_key) = ready_key {
                                entries.remove(&old_key);
                                stats.evictions += 1;
                            }
                        }

                        let slot: InFlightSlot = Arc::new(futures::lock::Mutex::new(None));
                        entries.insert(*key, CacheEntry::InFlight(slot.clone()));
                        Action::DoFetch(slot)
                    }
                }
            };

            match action {
                Action::Hit(value) => return Ok(value),
                Action::WaitOnInFlight(slot) => {
                    // The fetcher holds the lock until it is done.
                    let guard = slot.lock().await;
                    match guard.as_ref() {
                        Some(result) => return result.clone(),
                        None => {
                            // Orphaned in-flight: the fetching future was
                            // dropped before storing a result. Remove the
                            // stale entry (if it still matches this slot)
                            // and retry the lookup.
                            drop(guard);
                            let mut entries = self.entries.write();
                            let remove = matches!(
                                entries.get(key),
                                Some(CacheEntry::InFlight(s)) if Arc::ptr_eq(s, &slot)
                            );
                            if remove {
                                entries.remove(key);
                            }
                            continue;
                        }
                    }
                }
                Action::DoFetch(slot) => {
                    // We are the fetcher — hold the slot lock for waiters.
                    let mut guard = slot.lock().await;

                    let do_fetch = fetch
                        .take()
                        .expect("RecordCache::get_or_fetch fetch called more than once");
                    let result = do_fetch().await;
                    *guard = Some(result.clone());
                    drop(guard);

                    let mut entries = self.entries.write();
                    // Publish only if the key still holds this fetch's slot.
                    // An invalidation that landed mid-fetch supersedes the
                    // result: caching it would resurrect pre-write state,
                    // and removing on error could evict a newer fetcher.
                    let still_current = matches!(
                        entries.get(key),
                        Some(CacheEntry::InFlight(s)) if Arc::ptr_eq(s, &slot)
                    );
                    if still_current {
                        match &result {
                            Ok(value) => {
                                entries.insert(
                                    *key,
                                    CacheEntry::Ready {
                                        value: value.clone(),
                                        fetched_at: Instant::now(),
                                    },
                                );
                            }
                            Err(_) => {
                                // Errors are not cached: remove the in-flight
                                // entry so the next caller retries.
                                entries.remove(key);
                            }
                        }
                    }
                    return result;
                }
            }
        }
    }

    /// Mark one entry stale, forcing the next `get_or_fetch` to refetch.
    pub fn invalidate(&self, key: &QueryKey) {
        if self.entries.write().remove(key).is_some() {
            self.stats.write().invalidations += 1;
        }
    }

    /// Invalidate every query that is a superset of a written record: the
    /// record's own entry query and the scope's full listing. The program
    /// probe is untouched — a record write says nothing about deployment.
    pub fn invalidate_write(&self, scope: Scope, address: &StorageAddress) {
        debug!(%scope, %address, "invalidating cache after write");
        self.invalidate(&QueryKey::entry(scope, *address));
        self.invalidate(&QueryKey::all_entries(scope));
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|v| matches!(v, CacheEntry::Ready { .. }))
            .count()
    }

    /// Whether the cache holds no resolved entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
