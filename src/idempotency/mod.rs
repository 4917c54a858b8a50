//! # Idempotency SPI
//!
//! Maps an [`IdempotencyKey`] to the single [`OpId`] that represents it, so a
//! repeated command resolves to the operation already accepted for it.

use crate::error::OrchestratorResult;
use crate::models::{IdempotencyKey, OpId};
use async_trait::async_trait;

pub mod in_memory;

pub use in_memory::InMemoryIdempotencyManager;

/// Idempotency key registry
#[async_trait]
pub trait IdempotencyManager: Send + Sync + 'static {
    /// The OpId mapped to `key`, creating one on first use.
    ///
    /// Concurrent callers with the same key all receive the same OpId.
    async fn get_or_create(&self, key: &IdempotencyKey) -> OrchestratorResult<OpId>;

    /// The OpId mapped to `key`, if any
    async fn find(&self, key: &IdempotencyKey) -> OrchestratorResult<Option<OpId>>;

    /// Drop the mapping for `key` if it still points at `op_id`.
    ///
    /// Used when the operation was never dispatched. Returns whether a
    /// mapping was removed.
    async fn release(&self, key: &IdempotencyKey, op_id: &OpId) -> OrchestratorResult<bool>;
}
