//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use bytes::Bytes;
use chrono::Utc;
use docbin::{
    app,
    auth::Claims,
    catalog::{Catalog, SqliteCatalog, run_migrations},
    models::{bin::Bin, user::NewUser, user::User},
    queue::MemoryWorkQueue,
    search::MemorySearchIndex,
    state::{AppState, StateSettings},
    storage::{BlobMeta, ByteStream, MemoryObjectStore, ObjectStore, StoreError, StoreResult},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-secret";
pub const QUEUE_NAME: &str = "extraction_queue";
pub const BUCKET: &str = "docbin";
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// Object store that counts calls and fails selected operations on demand.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryObjectStore,
    calls: AtomicUsize,
    fail_copy: AtomicBool,
    fail_delete: AtomicBool,
    /// SQL run against the pool when a copy fails, to simulate a concurrent
    /// writer touching the catalog between two steps.
    on_copy_failure: Mutex<Option<(SqlitePool, String)>>,
}

impl FlakyStore {
    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    pub fn fail_copy(&self, fail: bool) {
        self.fail_copy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub async fn interfere_on_copy_failure(&self, pool: SqlitePool, sql: &str) {
        *self.on_copy_failure.lock().await = Some((pool, sql.to_string()));
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    fn provider_type(&self) -> &str {
        "flaky"
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }

    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> StoreResult<BlobMeta> {
        self.tick();
        self.inner.put(key, content, content_type).await
    }

    async fn get(&self, key: &str) -> StoreResult<(BlobMeta, ByteStream)> {
        self.tick();
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.tick();
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected delete failure for {key}")));
        }
        self.inner.delete(key).await
    }

    async fn copy(&self, from: &str, to: &str) -> StoreResult<()> {
        self.tick();
        if self.fail_copy.load(Ordering::SeqCst) {
            if let Some((pool, sql)) = self.on_copy_failure.lock().await.take() {
                sqlx::query(&sql).execute(&pool).await.unwrap();
            }
            return Err(StoreError::Backend(format!("injected copy failure for {from}")));
        }
        self.inner.copy(from, to).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.tick();
        self.inner.list(prefix).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: SqlitePool,
    pub catalog: Arc<SqliteCatalog>,
    pub store: Arc<FlakyStore>,
    pub queue: MemoryWorkQueue,
    pub index: MemorySearchIndex,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        run_migrations(&pool).await.expect("schema");

        let catalog = Arc::new(SqliteCatalog::new(Arc::new(pool.clone())));
        let store = Arc::new(FlakyStore::default());
        let queue = MemoryWorkQueue::new();
        let index = MemorySearchIndex::new();

        let state = AppState::new(
            catalog.clone(),
            store.clone(),
            Arc::new(queue.clone()),
            Arc::new(index.clone()),
            StateSettings {
                jwt_secret: JWT_SECRET.into(),
                extraction_queue: QUEUE_NAME.into(),
                bucket: BUCKET.into(),
            },
        );

        Self {
            router: app(state.clone(), MAX_UPLOAD_BYTES),
            state,
            pool,
            catalog,
            store,
            queue,
            index,
        }
    }

    pub async fn create_user(&self, email: &str) -> (User, Bin) {
        self.catalog
            .create_user(&NewUser {
                email: email.into(),
                display_name: email.split('@').next().unwrap_or_default().into(),
                credential_hash: "hash".into(),
            })
            .await
            .expect("create user")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request with an optional JSON body and decode the JSON reply.
    pub async fn json_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = self.send(builder.body(body).unwrap()).await;
        read_json(response).await
    }

    pub async fn upload(&self, token: &str, form: &Multipart) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/document")
            .header("Authorization", format!("Bearer {}", token))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form.body()))
            .unwrap();
        read_json(self.send(request).await).await
    }
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn token_for(user_id: i64) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub const BOUNDARY: &str = "docbin-test-boundary";

/// Minimal multipart/form-data builder.
pub struct Multipart {
    parts: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, file_name: &str, content_type: &str, content: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(content);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    pub fn body(&self) -> Vec<u8> {
        let mut body = self.parts.clone();
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}

/// A complete upload form for a PDF.
pub fn pdf_upload(bin_id: i64, reference_name: &str, content: &[u8]) -> Multipart {
    Multipart::new()
        .file("scan.pdf", "application/pdf", content)
        .text("referenceName", reference_name)
        .text("binID", &bin_id.to_string())
        .text("language", "eng")
}

/// Whatever the store holds under `key`.
pub async fn stored(app: &TestApp, key: &str) -> Option<Bytes> {
    app.store.inner().content(key).await
}
