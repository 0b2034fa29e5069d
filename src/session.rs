//! Per-thread request serialization
//!
//! Two requests on the same thread id would otherwise interleave steps of the
//! same conversation state and race on the same artifact files. A request
//! holds its thread's lock from before the first step is pulled until the
//! step source is finished or abandoned. Different threads never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub type ThreadGuard = OwnedMutexGuard<()>;

#[derive(Clone, Default)]
pub struct ThreadLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `thread_id`.
    pub async fn acquire(&self, thread_id: &str) -> ThreadGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only the map refers to are neither held nor awaited
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(thread_id.to_string()).or_default().clone()
        };

        match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(thread_id = %thread_id, "Waiting for in-flight request on thread");
                lock.lock_owned().await
            }
        }
    }

    /// Threads with a request running or queued
    pub fn active_threads(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}
