//! Full-text index access.
//!
//! The extraction worker fills the index; this crate only queries it. Hits
//! are treated as candidates and always re-checked against the catalog.

pub mod elasticsearch;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

pub use elasticsearch::ElasticsearchIndex;
pub use memory::MemorySearchIndex;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

pub type SearchResult<T> = Result<T, SearchError>;

/// A full-text query scoped to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub user_id: i64,
    pub limit: usize,
}

impl SearchQuery {
    /// Boolean query: `match` on the extracted text, `term` filter on owner.
    pub fn to_query_dsl(&self) -> Value {
        json!({
            "size": self.limit,
            "query": {
                "bool": {
                    "must": [
                        { "match": { "text": self.text } }
                    ],
                    "filter": [
                        { "term": { "user_id": self.user_id } }
                    ]
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub document_id: i64,
}

/// Capability interface over a full-text index.
#[async_trait]
pub trait SearchIndex: Send + Sync + std::fmt::Debug + 'static {
    fn provider_type(&self) -> &str;

    async fn health_check(&self) -> SearchResult<()>;

    /// Hits in relevance order.
    async fn search(&self, query: &SearchQuery) -> SearchResult<Vec<SearchHit>>;
}
