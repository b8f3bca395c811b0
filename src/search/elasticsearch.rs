//! Elasticsearch `_search` over HTTP.

use super::{SearchError, SearchHit, SearchIndex, SearchQuery, SearchResult};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ElasticsearchIndex {
    client: Client,
    base_url: Url,
    index: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Value,
}

impl Hit {
    /// The worker writes `document_id` as a JSON number; older entries may
    /// carry it as a float. Fractional values are not ids.
    fn document_id(&self) -> Option<i64> {
        let raw = self.source.get("document_id")?;
        raw.as_i64().or_else(|| {
            raw.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })
    }
}

impl Hits {
    /// Ids of the first `limit` raw hits. Hits without a usable id still
    /// count toward the limit.
    fn document_ids(&self, limit: usize) -> Vec<SearchHit> {
        self.hits
            .iter()
            .take(limit)
            .filter_map(Hit::document_id)
            .map(|document_id| SearchHit { document_id })
            .collect()
    }
}

impl ElasticsearchIndex {
    pub fn new(base_url: Url, index: impl Into<String>) -> SearchResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            index: index.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    fn provider_type(&self) -> &str {
        "elasticsearch"
    }

    async fn health_check(&self) -> SearchResult<()> {
        let resp = self.client.get(self.endpoint("_cluster/health")).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
        let url = self.endpoint(&format!("{}/_search", self.index));
        let resp = self
            .client
            .post(&url)
            .json(&query.to_query_dsl())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let body: SearchResponse = resp.json().await?;
        let hits = body.hits.document_ids(query.limit);
        debug!(index = %self.index, hits = hits.len(), "search completed");
        Ok(hits)
    }
}
