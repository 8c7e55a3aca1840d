//! Per-user critical sections.
//!
//! Every mutation of a single user's profile, buffer, or cluster rows is a
//! read-modify-write over shared state, so request handlers and the
//! background sweep must serialize per user. Different users never share a
//! lock and proceed fully in parallel; there is no global lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-user async mutexes, created lazily on first use.
#[derive(Debug, Default, Clone)]
pub struct UserLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `user_id`, waiting if another task holds it.
    ///
    /// The guard is owning, so it can cross `.await` points and be dropped
    /// early to release the critical section before expensive follow-up work.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
