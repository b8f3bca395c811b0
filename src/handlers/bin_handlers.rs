//! HTTP handlers for bins.

use super::warning_headers;
use crate::{auth::AuthUser, errors::AppError, models::bin::Bin, models::document::Document, state::AppState};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateBinReq {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameBinReq {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBinReq {
    pub id: i64,
}

/// `POST /bins`
pub async fn create_bin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    req: Result<Json<CreateBinReq>, JsonRejection>,
) -> Result<(StatusCode, Json<Bin>), AppError> {
    let Json(req) = req?;
    let bin = state.bins.create(&principal, &req.name).await?;
    Ok((StatusCode::CREATED, Json(bin)))
}

/// `GET /bins`
pub async fn list_bins(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<Bin>>, AppError> {
    Ok(Json(state.bins.list(&principal).await?))
}

/// `GET /bins/{id}` — the documents inside a bin.
pub async fn bin_documents(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.bins.documents_in_bin(&principal, id).await?))
}

/// `PATCH /bins`
pub async fn rename_bin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    req: Result<Json<RenameBinReq>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = req?;
    state.bins.rename(&principal, req.id, &req.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /bins`
pub async fn delete_bin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    req: Result<Json<DeleteBinReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let outcome = state.bins.delete_bin(&principal, req.id).await?;
    Ok((StatusCode::NO_CONTENT, warning_headers(&outcome.warnings)))
}
