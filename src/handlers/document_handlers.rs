//! HTTP handlers for documents.
//! Uploads arrive as multipart forms; asset downloads are streamed straight
//! from the object store.

use super::warning_headers;
use crate::{
    auth::AuthUser,
    errors::AppError,
    models::document::{Document, Language},
    services::{Upload, documents::Asset},
    state::AppState,
    storage::BlobMeta,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::MultipartError, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameDocumentReq {
    pub id: i64,
    pub reference_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDocumentReq {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

/// Collect the form fields of an upload. Field order is not fixed, so the
/// file is buffered before anything is stored.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut reference_name = None;
    let mut bin_id = None;
    let mut language = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let content = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, content_type, content));
            }
            "referenceName" => reference_name = Some(field.text().await.map_err(multipart_error)?),
            "binID" => bin_id = Some(field.text().await.map_err(multipart_error)?),
            "language" => language = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let (file_name, content_type, content) =
        file.ok_or_else(|| AppError::bad_request("file is required"))?;
    let bin_id = bin_id
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| AppError::bad_request("binID is required"))?
        .parse::<i64>()
        .map_err(|_| AppError::bad_request("binID must be an integer"))?;
    let language = language
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| AppError::bad_request("language is required"))?
        .parse::<Language>()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    Ok(Upload {
        file_name,
        content_type,
        content,
        reference_name: reference_name.unwrap_or_default(),
        bin_id,
        language,
    })
}

/// `POST /document` — multipart upload.
pub async fn upload_document(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(multipart).await?;
    let outcome = state.documents.create(&principal, upload).await?;
    Ok((
        StatusCode::CREATED,
        warning_headers(&outcome.warnings),
        Json(outcome.value),
    ))
}

/// `GET /document/{id}`
pub async fn get_document(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.documents.get(&principal, id).await?))
}

/// `GET /document/{id}/asset` — stream the stored content.
pub async fn get_document_asset(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let Asset {
        document,
        meta,
        stream,
    } = state.documents.get_asset(&principal, id).await?;

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_asset_headers(response.headers_mut(), &meta, &document.name);
    Ok(response)
}

/// `PATCH /document`
pub async fn rename_document(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    req: Result<Json<RenameDocumentReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    let outcome = state
        .documents
        .rename_document(&principal, req.id, &req.reference_name)
        .await?;
    Ok((StatusCode::NO_CONTENT, warning_headers(&outcome.warnings)))
}

/// `DELETE /document`
pub async fn delete_document(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    req: Result<Json<DeleteDocumentReq>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = req?;
    state.documents.delete_document(&principal, req.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /document/search?q=…`
pub async fn search_documents(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(
        state.search.search(&principal, params.q.as_deref()).await?,
    ))
}

fn set_asset_headers(headers: &mut HeaderMap, meta: &BlobMeta, file_name: &str) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));

    let quoted = format!("\"{}\"", meta.etag);
    if let Ok(value) = HeaderValue::from_str(&quoted) {
        headers.insert(header::ETAG, value);
    }

    let disposition = format!("inline; filename=\"{}\"", file_name.replace(['"', '\\'], "_"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("inline")),
    );

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
