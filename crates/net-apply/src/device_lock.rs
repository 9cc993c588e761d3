//! Per-device serialization of transactions

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of one async mutex per device.
///
/// The candidate lock only stops concurrent writes on the device; two local
/// applies to the same host would otherwise race for it and one would fail
/// with `LockFailed`.
#[derive(Debug, Default)]
pub struct DeviceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder exists for `host`.
    ///
    /// Entries nobody holds or waits on are dropped on the way, so the
    /// registry only grows with the number of hosts in flight.
    pub async fn acquire(&self, host: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // guards and waiters each own a clone
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of hosts held or waited on, plus any released since the last acquire
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_same_host_waits() {
        let locks = Arc::new(DeviceLocks::new());
        let guard = locks.acquire("r1").await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("r1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_other_hosts_do_not_wait() {
        let locks = DeviceLocks::new();
        let _r1 = locks.acquire("r1").await;
        let r2 = timeout(Duration::from_millis(100), locks.acquire("r2")).await;
        assert!(r2.is_ok());
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_released_hosts_are_forgotten() {
        let locks = DeviceLocks::new();
        drop(locks.acquire("r1").await);
        drop(locks.acquire("r2").await);
        let _r3 = locks.acquire("r3").await;
        assert_eq!(locks.len().await, 1);

        let _again = locks.acquire("r1").await;
        assert_eq!(locks.len().await, 2);
    }
}
