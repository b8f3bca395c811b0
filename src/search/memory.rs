//! In-memory index with naive term matching, for tests and local runs.

use super::{SearchHit, SearchIndex, SearchQuery, SearchResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    document_id: i64,
    user_id: i64,
    text: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySearchIndex {
    entries: Arc<RwLock<Vec<Entry>>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add extracted text for a document, the way the worker would.
    pub async fn index(&self, document_id: i64, user_id: i64, text: impl Into<String>) {
        self.entries.write().await.push(Entry {
            document_id,
            user_id,
            text: text.into().to_lowercase(),
        });
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> SearchResult<()> {
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
        let terms: Vec<String> = query
            .text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.user_id == query.user_id)
            .filter(|e| terms.iter().any(|t| e.text.contains(t.as_str())))
            .take(query.limit)
            .map(|e| SearchHit {
                document_id: e.document_id,
            })
            .collect())
    }
}
