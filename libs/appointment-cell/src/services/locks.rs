// libs/appointment-cell/src/services/locks.rs
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Keyed async locks serializing work per appointment (or per specialist
/// while a booking checks the calendar).
#[derive(Clone, Default)]
pub struct AppointmentLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl AppointmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            // Entries only the map still references are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}
