//! Per-message mutual exclusion for the load-modify-save sequence.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// A lock per message identifier.
///
/// Tasks working on the same message queue behind each other; tasks on different
/// messages never contend. Entries are dropped once no task holds or awaits them,
/// so the map only grows with the number of messages currently being edited.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone, Default)]
pub struct MessageLocks {
    inner: Arc<LockMap>,
}

impl MessageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `message_id`.
    pub async fn lock(&self, message_id: &str) -> MessageGuard {
        // The clone is taken while the shard is locked, so the count check in `Drop` sees every waiter.
        let lock = self.inner.entry(message_id.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;

        MessageGuard {
            guard: Some(guard),
            key: message_id.to_string(),
            map: self.inner.clone(),
        }
    }

    /// Number of messages that currently have a holder or a waiter.
    pub fn active(&self) -> usize {
        self.inner.len()
    }
}

/// Exclusive access to one message; released on drop.
pub struct MessageGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    map: Arc<LockMap>,
}

impl Drop for MessageGuard {
    fn drop(&mut self) {
        // Release first, so our own reference no longer counts.
        drop(self.guard.take());

        self.map.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_message_is_exclusive() {
        let locks = MessageLocks::new();

        let first = locks.lock("msg1").await;

        let pending = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("msg1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(5), pending).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_different_messages_do_not_contend() {
        let locks = MessageLocks::new();

        let _first = locks.lock("msg1").await;
        let second = tokio::time::timeout(Duration::from_secs(1), locks.lock("msg2")).await;

        assert!(second.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_removed_when_released() {
        let locks = MessageLocks::new();

        {
            let _guard = locks.lock("msg1").await;
            assert_eq!(locks.active(), 1);
        }

        assert_eq!(locks.active(), 0);
    }
}
