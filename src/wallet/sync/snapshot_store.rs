//! In-memory store of wallet snapshots.
//!
//! This module provides the `WalletSnapshotStore`, the arena holding the latest known state of
//! every wallet in the engine's working set. Snapshots are listed in registration order. The
//! store is also where the per-wallet in-flight claim lives: `try_begin_sync` moves a wallet to
//! `Syncing` atomically, so two requests for the same wallet can never both run.
//!
//! Every mutation is a single short critical section. No lock is held across a provider call.

use crate::provider::Chain;
use crate::wallet::{
    SyncOutcome, SyncStatus, WalletDescriptor, WalletId, WalletSnapshot, WalletSyncError,
};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

struct Entry {
    /// Distinguishes a re-added wallet from the one an in-flight attempt was started for.
    generation: u64,
    snapshot: WalletSnapshot,
}

#[derive(Default)]
struct StoreInner {
    order: Vec<WalletId>,
    entries: HashMap<WalletId, Entry>,
    next_generation: u64,
}

/// Claim on a wallet's single in-flight slot.
///
/// Returned by `try_begin_sync` and consumed by `complete_sync`. A ticket dropped without
/// completing (its task was abandoned) puts the wallet back into the status it had before.
#[derive(Debug)]
pub struct SyncTicket {
    wallet: WalletDescriptor,
    generation: u64,
    previous_status: SyncStatus,
    store: Weak<WalletSnapshotStore>,
    settled: bool,
}

impl SyncTicket {
    pub fn wallet(&self) -> &WalletDescriptor {
        &self.wallet
    }
}

impl Drop for SyncTicket {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.release(&self.wallet.id, self.generation, self.previous_status);
        }
    }
}

/// Registry of wallet snapshots keyed by wallet id
#[derive(Default)]
pub struct WalletSnapshotStore {
    inner: Mutex<StoreInner>,
}

impl WalletSnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a wallet to the working set with an idle, empty snapshot.
    pub fn insert(&self, wallet: &WalletDescriptor) -> Result<WalletSnapshot, WalletSyncError> {
        let mut inner = self.lock();
        if inner.entries.contains_key(&wallet.id) {
            return Err(WalletSyncError::DuplicateWallet(wallet.id.clone()));
        }

        let snapshot = WalletSnapshot::new(wallet);
        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.order.push(wallet.id.clone());
        inner.entries.insert(
            wallet.id.clone(),
            Entry {
                generation,
                snapshot: snapshot.clone(),
            },
        );
        Ok(snapshot)
    }

    /// Drop a wallet from the working set, returning its last snapshot.
    pub fn remove(&self, id: &WalletId) -> Result<WalletSnapshot, WalletSyncError> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .remove(id)
            .ok_or_else(|| WalletSyncError::WalletNotFound(id.clone()))?;
        inner.order.retain(|existing| existing != id);
        Ok(entry.snapshot)
    }

    pub fn get(&self, id: &WalletId) -> Result<WalletSnapshot, WalletSyncError> {
        self.lock()
            .entries
            .get(id)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| WalletSyncError::WalletNotFound(id.clone()))
    }

    /// Snapshots in registration order, optionally restricted to some chains.
    pub fn list(&self, chain_filter: Option<&[Chain]>) -> Vec<WalletSnapshot> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .map(|entry| &entry.snapshot)
            .filter(|snapshot| matches_filter(snapshot.chain, chain_filter))
            .cloned()
            .collect()
    }

    /// Ids of the wallets a cycle with the given filter covers.
    pub fn working_set(&self, chain_filter: Option<&[Chain]>) -> Vec<WalletId> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .entries
                    .get(*id)
                    .is_some_and(|entry| matches_filter(entry.snapshot.chain, chain_filter))
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move a wallet to `Syncing` unless an attempt is already in flight for it.
    pub fn try_begin_sync(self: &Arc<Self>, id: &WalletId) -> Result<SyncTicket, WalletSyncError> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| WalletSyncError::WalletNotFound(id.clone()))?;
        if entry.snapshot.is_syncing() {
            return Err(WalletSyncError::AlreadySyncing(id.clone()));
        }

        let previous_status = entry.snapshot.status;
        entry.snapshot.status = SyncStatus::Syncing;
        Ok(SyncTicket {
            wallet: entry.snapshot.descriptor(),
            generation: entry.generation,
            previous_status,
            store: Arc::downgrade(self),
            settled: false,
        })
    }

    /// Apply a finished attempt to the wallet it was started for.
    ///
    /// Returns the updated snapshot, or `None` when the wallet has left the working set
    /// (or was removed and added again) while the attempt was running.
    pub fn complete_sync(
        &self,
        mut ticket: SyncTicket,
        outcome: &SyncOutcome,
        completed_at: DateTime<Utc>,
    ) -> Option<WalletSnapshot> {
        ticket.settled = true;
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(&ticket.wallet.id)?;
        if entry.generation != ticket.generation {
            return None;
        }
        entry.snapshot.apply_outcome(outcome, completed_at);
        Some(entry.snapshot.clone())
    }

    fn release(&self, id: &WalletId, generation: u64, previous_status: SyncStatus) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(id) {
            if entry.generation == generation && entry.snapshot.is_syncing() {
                entry.snapshot.status = previous_status;
            }
        }
    }
}

fn matches_filter(chain: Chain, chain_filter: Option<&[Chain]>) -> bool {
    chain_filter.is_none_or(|chains| chains.contains(&chain))
}
