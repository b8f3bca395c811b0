//! Document bins: user-owned containers of uploaded documents, kept
//! consistent across a relational catalog, an object store, an extraction
//! queue and a full-text index.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod outcome;
pub mod queue;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;
pub mod storage;

use axum::Router;
use state::AppState;

/// The full application router with state attached.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes::routes::routes(max_upload_bytes).with_state(state)
}
