//! In-memory [`IdempotencyManager`] backed by a `DashMap`.

use super::IdempotencyManager;
use crate::error::OrchestratorResult;
use crate::models::{IdempotencyKey, OpId};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// Maps idempotency keys to the OpId first assigned to them.
///
/// ```rust
/// use orchestrator_core::idempotency::{IdempotencyManager, InMemoryIdempotencyManager};
/// use orchestrator_core::models::{Command, IdempotencyKey};
///
/// # tokio_test::block_on(async {
/// let manager = InMemoryIdempotencyManager::new();
/// let command = Command::parse("ORDERS", "ORDER_PLACED", "order-1", "idem-1", "{}").unwrap();
/// let key = IdempotencyKey::from(&command);
///
/// let first = manager.get_or_create(&key).await.unwrap();
/// let again = manager.get_or_create(&key).await.unwrap();
/// assert_eq!(first, again);
/// assert_eq!(manager.find(&key).await.unwrap(), Some(first));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyManager {
    keys: DashMap<IdempotencyKey, OpId>,
}

impl InMemoryIdempotencyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&self) {
        self.keys.clear();
    }
}

#[async_trait]
impl IdempotencyManager for InMemoryIdempotencyManager {
    async fn get_or_create(&self, key: &IdempotencyKey) -> OrchestratorResult<OpId> {
        // The entry guard holds the shard lock, so racing callers see one OpId
        let op_id = self
            .keys
            .entry(key.clone())
            .or_insert_with(|| {
                let op_id = OpId::generate();
                debug!(key = %key, op_id = %op_id, "Registered idempotency key");
                op_id
            })
            .clone();
        Ok(op_id)
    }

    async fn find(&self, key: &IdempotencyKey) -> OrchestratorResult<Option<OpId>> {
        Ok(self.keys.get(key).map(|entry| entry.value().clone()))
    }

    async fn release(&self, key: &IdempotencyKey, op_id: &OpId) -> OrchestratorResult<bool> {
        let removed = self.keys.remove_if(key, |_, bound| bound == op_id).is_some();
        if removed {
            debug!(key = %key, op_id = %op_id, "Released idempotency key");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Command;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn key(idem: &str) -> IdempotencyKey {
        let command = Command::parse("PAYMENT", "CHARGE", "order-9", idem, "{}").unwrap();
        IdempotencyKey::from(&command)
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let manager = InMemoryIdempotencyManager::new();
        let first = manager.get_or_create(&key("idem-1")).await.unwrap();
        let second = manager.get_or_create(&key("idem-1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_ids() {
        let manager = InMemoryIdempotencyManager::new();
        let a = manager.get_or_create(&key("idem-a")).await.unwrap();
        let b = manager.get_or_create(&key("idem-b")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_find_does_not_create() {
        let manager = InMemoryIdempotencyManager::new();
        assert_eq!(manager.find(&key("missing")).await.unwrap(), None);
        assert!(manager.is_empty());

        let created = manager.get_or_create(&key("missing")).await.unwrap();
        assert_eq!(manager.find(&key("missing")).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_release_only_drops_matching_binding() {
        let manager = InMemoryIdempotencyManager::new();
        let bound = manager.get_or_create(&key("idem-r")).await.unwrap();

        let stranger = OpId::generate();
        assert!(!manager.release(&key("idem-r"), &stranger).await.unwrap());
        assert_eq!(manager.find(&key("idem-r")).await.unwrap(), Some(bound.clone()));

        assert!(manager.release(&key("idem-r"), &bound).await.unwrap());
        assert!(manager.is_empty());

        let rebound = manager.get_or_create(&key("idem-r")).await.unwrap();
        assert_ne!(rebound, bound);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_id() {
        let manager = Arc::new(InMemoryIdempotencyManager::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.get_or_create(&key("shared")).await.unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1);
    }
}
