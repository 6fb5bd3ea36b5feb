use async_trait::async_trait;

use crate::message_store::error::Result;
use crate::models::MessageRecord;

/// Insert-only capability handed to every relay connection.
///
/// Implementations must be safe to call concurrently without external locking;
/// each `insert` is independent of every other one.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Durably persist one record
    async fn insert(&self, record: MessageRecord) -> Result<()>;

    /// Release the backing connection(s). Safe to call more than once; inserts
    /// after close fail with [`StoreError::Closed`](crate::message_store::StoreError::Closed).
    async fn close(&self);
}
