//! Per-target serialization.
//!
//! Every mutating engine operation on a target runs while holding that
//! target's lock, so start, transition, evaluation, cancel and scheduled
//! jobs for one target never interleave. Operations on different targets
//! proceed in parallel.

use approval_workflow_types::TargetRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by target
#[derive(Clone, Default)]
pub struct TargetLocks {
    inner: Arc<Mutex<HashMap<TargetRef, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of one operation on a target
pub type TargetGuard = OwnedMutexGuard<()>;

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, target: &TargetRef) -> TargetGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody else holds so the map stays bounded.
            map.retain(|key, m| key == target || Arc::strong_count(m) > 1);
            map.entry(target.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }
}
