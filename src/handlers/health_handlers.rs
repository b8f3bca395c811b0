//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks every backend

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe: always 200 OK, never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Probes the catalog, the object store, the work queue and the search
/// index. HTTP 200 when all checks pass, HTTP 503 when any fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (catalog, store, queue, index) = tokio::join!(
        state.catalog.ping(),
        state.store.health_check(),
        state.queue.health_check(),
        state.index.health_check(),
    );

    let mut checks = HashMap::new();
    checks.insert("catalog", CheckStatus::from_result(catalog));
    checks.insert(
        "object_store",
        CheckStatus::from_result(store).provider(state.store.provider_type()),
    );
    checks.insert(
        "work_queue",
        CheckStatus::from_result(queue).provider(state.queue.provider_type()),
    );
    checks.insert(
        "search_index",
        CheckStatus::from_result(index).provider(state.index.provider_type()),
    );

    let overall_ok = checks.values().all(|c| c.ok);
    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    error: Option<String>,
}

impl CheckStatus {
    fn from_result<E: std::fmt::Display>(res: Result<(), E>) -> Self {
        match res {
            Ok(()) => Self {
                ok: true,
                provider: None,
                error: None,
            },
            Err(e) => Self {
                ok: false,
                provider: None,
                error: Some(format!("error: {e}")),
            },
        }
    }

    fn provider(mut self, name: &str) -> Self {
        self.provider = Some(name.to_string());
        self
    }
}
