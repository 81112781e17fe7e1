use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::Message;

use crate::error::StoreError;

/// Storage operations a delivery cycle needs, and nothing more.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Up to `limit` unsent messages, oldest `created_at` first.
    async fn fetch_unsent(&self, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Open a transaction private to the caller.
    async fn begin(&self) -> Result<Box<dyn OutboxTx>, StoreError>;
}

/// A scoped storage transaction.
///
/// Dropping it without calling [`OutboxTx::commit`] rolls back every change
/// made through it.
#[async_trait]
pub trait OutboxTx: Send {
    /// Set `sent`, `sent_at = now` and `updated_at = now` for exactly `ids`.
    /// Returns the number of rows updated.
    async fn mark_sent(&mut self, ids: &[i64], now: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
