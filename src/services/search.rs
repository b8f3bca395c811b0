//! Full-text search reconciled against the catalog.

use super::error::{ServiceError, ServiceResult};
use crate::{
    auth::Principal,
    catalog::Catalog,
    models::document::Document,
    search::{SearchIndex, SearchQuery},
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// Hits taken from the index per query.
pub const MAX_HITS: usize = 4;

#[derive(Debug, Clone)]
pub struct SearchBridge {
    catalog: Arc<dyn Catalog>,
    index: Arc<dyn SearchIndex>,
}

impl SearchBridge {
    pub fn new(catalog: Arc<dyn Catalog>, index: Arc<dyn SearchIndex>) -> Self {
        Self { catalog, index }
    }

    /// Search the caller's documents. Index hits are only ids; the returned
    /// documents come from the catalog, filtered by owner, in hit order.
    pub async fn search(&self, principal: &Principal, q: Option<&str>) -> ServiceResult<Vec<Document>> {
        let text = q.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(ServiceError::Validation("search query `q` is required".into()));
        }

        let query = SearchQuery {
            text: text.to_string(),
            user_id: principal.user_id,
            limit: MAX_HITS,
        };
        let hits = self
            .index
            .search(&query)
            .await
            .map_err(|e| ServiceError::Dependency(format!("search failed: {e}")))?;

        let mut ids: Vec<i64> = Vec::with_capacity(MAX_HITS);
        for hit in hits.into_iter().take(MAX_HITS) {
            if !ids.contains(&hit.document_id) {
                ids.push(hit.document_id);
            }
        }
        debug!(user_id = principal.user_id, hits = ids.len(), "search hits");
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<i64, Document> = self
            .catalog
            .fetch_documents(&ids, principal.user_id)
            .await?
            .into_iter()
            .map(|doc| (doc.id, doc))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
