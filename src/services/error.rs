//! Error taxonomy shared by every service.

use crate::{catalog::CatalogError, storage::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing input, unsupported content type or language.
    #[error("{0}")]
    Validation(String),
    /// Missing or unverifiable credential.
    #[error("permission denied")]
    Unauthenticated,
    /// The caller does not own the resource.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// The resource changed underneath the request.
    #[error("{0}")]
    Conflict(String),
    /// A store, queue or index call failed.
    #[error("{0}")]
    Dependency(String),
    /// A compensating write failed: metadata no longer matches the object
    /// store and an operator has to reconcile it.
    #[error(
        "inconsistent state for document {document_id}: metadata names `{recorded}` but the blob \
         still lives under `{blob_name}` ({detail})"
    )]
    Inconsistent {
        document_id: i64,
        recorded: String,
        blob_name: String,
        detail: String,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Duplicate(what) => ServiceError::Validation(format!("{what} already exists")),
            CatalogError::Sqlx(err) => ServiceError::Dependency(format!("metadata store error: {err}")),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnsupportedMediaType(_) | StoreError::InvalidKey(_) => {
                ServiceError::Validation(err.to_string())
            }
            StoreError::NotFound(_) => ServiceError::NotFound(err.to_string()),
            StoreError::Io(_) | StoreError::Backend(_) => ServiceError::Dependency(err.to_string()),
        }
    }
}
