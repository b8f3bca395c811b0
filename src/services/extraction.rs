//! Hands stored uploads to the text-extraction worker.

use crate::{
    models::document::Document,
    queue::{QueueError, QueueResult, WorkQueue},
    storage::ObjectKey,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::debug;

pub const DEFAULT_QUEUE_NAME: &str = "extraction_queue";
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Message consumed by the extraction worker. Field names are part of the
/// worker contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionJob {
    #[serde(rename = "documentID")]
    pub document_id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "fileKey")]
    pub file_key: String,
    pub bucket: String,
    pub extension: String,
    pub language: String,
}

impl ExtractionJob {
    pub fn for_document(doc: &Document, user_id: i64, key: &ObjectKey, bucket: &str) -> Self {
        Self {
            document_id: doc.id,
            user_id,
            file_key: key.to_string(),
            bucket: bucket.to_string(),
            extension: doc.extension().to_string(),
            language: doc.language.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionDispatcher {
    queue: Arc<dyn WorkQueue>,
    queue_name: String,
    bucket: String,
    timeout: Duration,
}

impl ExtractionDispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>, queue_name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            bucket: bucket.into(),
            timeout: PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Publish one job. Bounded by the dispatcher timeout; never retried.
    pub async fn dispatch(&self, job: &ExtractionJob) -> QueueResult<()> {
        let payload = serde_json::to_vec(job)?;
        match tokio::time::timeout(self.timeout, self.queue.publish(&self.queue_name, payload)).await {
            Ok(res) => res?,
            Err(_) => return Err(QueueError::Timeout(self.timeout)),
        }
        debug!(
            queue = %self.queue_name,
            document_id = job.document_id,
            "extraction job published"
        );
        Ok(())
    }
}
