//! Per-client serialization
//!
//! Withdrawals read a balance and then insert a ticket in two separate store
//! requests. Holding the client's lock across both closes the window where a
//! second withdrawal could read the same pre-withdrawal balance. Locks are
//! keyed by client, so operations for different clients never wait on each
//! other.

use crate::types::ClientId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard held while a client's balance-dependent write is in flight
pub type ClientGuard = OwnedMutexGuard<()>;

/// One async mutex per client, created on first use
#[derive(Default)]
pub struct ClientLocks {
    locks: DashMap<ClientId, Arc<Mutex<()>>>,
}

impl ClientLocks {
    /// Empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `client_id`
    pub async fn lock(&self, client_id: ClientId) -> ClientGuard {
        // Clone the Arc out so the map shard is not held across the await
        let lock = self
            .locks
            .entry(client_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of clients with a lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no client has a lock entry
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
