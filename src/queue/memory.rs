//! In-process queue. Messages never leave the process; used by tests and
//! when no broker is configured.

use super::{QueueError, QueueResult, WorkQueue};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct MemoryWorkQueue {
    queues: Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail, to simulate a broker outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Messages published to `queue`, oldest first.
    pub async fn messages(&self, queue: &str) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .await
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> QueueResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Backend("queue unavailable".into()));
        }
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()> {
        self.health_check().await?;
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push(payload);
        Ok(())
    }
}
