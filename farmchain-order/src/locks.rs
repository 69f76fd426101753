use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Per-order async mutexes. Entries are created on demand and dropped
/// again once nobody holds or waits for them.
#[derive(Clone, Default)]
pub struct OrderLocks {
    table: LockTable,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, order_id: &str) -> OrderGuard {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            table.entry(order_id.to_string()).or_default().clone()
        };
        let guard = mutex.clone().lock_owned().await;
        OrderGuard {
            guard: Some(guard),
            mutex,
            order_id: order_id.to_string(),
            table: self.table.clone(),
        }
    }

    /// Number of orders with a live lock entry
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .map(|table| table.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct OrderGuard {
    guard: Option<OwnedMutexGuard<()>>,
    mutex: Arc<AsyncMutex<()>>,
    order_id: String,
    table: LockTable,
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // table + owned guard + our handle; anything above that is a waiter
        if Arc::strong_count(&self.mutex) <= 3 {
            table.remove(&self.order_id);
        }
        self.guard.take();
    }
}
