//! Defines routes for bin and document operations.
//!
//! ## Structure
//! - **Bin endpoints**
//!   - `POST   /bins`       — create bin
//!   - `GET    /bins`       — list the caller's bins
//!   - `GET    /bins/{id}`  — documents in a bin
//!   - `PATCH  /bins`       — rename bin
//!   - `DELETE /bins`       — delete bin and its documents
//!
//! - **Document endpoints**
//!   - `POST   /document`               — multipart upload
//!   - `GET    /document/{id}`          — metadata
//!   - `GET    /document/{id}/asset`    — stored content
//!   - `PATCH  /document`               — change reference name
//!   - `DELETE /document`               — delete document
//!   - `GET    /document/search?q=…`    — full-text search
//!
//! Every API route is served at the root and again under `/api/v1`.

use crate::{
    handlers::{
        bin_handlers::{bin_documents, create_bin, delete_bin, list_bins, rename_bin},
        document_handlers::{
            delete_document, get_document, get_document_asset, rename_document, search_documents,
            upload_document,
        },
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router for all API routes plus health probes.
///
/// `max_upload_bytes` bounds request bodies, multipart uploads included.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let api = Router::new()
        .route(
            "/bins",
            get(list_bins)
                .post(create_bin)
                .patch(rename_bin)
                .delete(delete_bin),
        )
        .route("/bins/{id}", get(bin_documents))
        .route(
            "/document",
            post(upload_document)
                .patch(rename_document)
                .delete(delete_document),
        )
        // static segment wins over `{id}`
        .route("/document/search", get(search_documents))
        .route("/document/{id}", get(get_document))
        .route("/document/{id}/asset", get(get_document_asset))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api/v1", api.clone())
        .merge(api)
}
