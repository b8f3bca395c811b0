//! Durable work queues consumed by the extraction worker.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryWorkQueue;
pub use self::redis::RedisWorkQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Capability interface over a message queue.
#[async_trait]
pub trait WorkQueue: Send + Sync + std::fmt::Debug + 'static {
    fn provider_type(&self) -> &str;

    async fn health_check(&self) -> QueueResult<()>;

    /// Append one persistent message to the named queue.
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()>;
}
