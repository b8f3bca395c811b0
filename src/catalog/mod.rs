//! Relational metadata: users, bins and documents.
//!
//! The catalog is the source of truth for ownership and reference names.
//! Object-store contents and search-index entries are only ever trusted after
//! being reconciled against it.

pub mod sqlite;

use crate::models::{
    bin::Bin,
    document::{Document, NewDocument},
    user::{NewUser, User},
};
use async_trait::async_trait;
use thiserror::Error;

pub use sqlite::{SqliteCatalog, run_migrations};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} already exists")]
    Duplicate(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Capability interface over the relational store.
///
/// Lookups return `Ok(None)` for missing rows; mutations that target a
/// missing row report it through their return value rather than an error.
#[async_trait]
pub trait Catalog: Send + Sync + std::fmt::Debug + 'static {
    /// Lightweight connectivity probe.
    async fn ping(&self) -> CatalogResult<()>;

    /// Insert a user and its default bin in one transaction.
    async fn create_user(&self, user: &NewUser) -> CatalogResult<(User, Bin)>;
    async fn get_user(&self, id: i64) -> CatalogResult<Option<User>>;

    async fn create_bin(&self, owner_id: i64, name: &str) -> CatalogResult<Bin>;
    async fn get_bin(&self, id: i64) -> CatalogResult<Option<Bin>>;
    async fn list_bins(&self, owner_id: i64) -> CatalogResult<Vec<Bin>>;
    async fn count_bins(&self, owner_id: i64) -> CatalogResult<i64>;
    /// Returns false when no bin with `id` exists.
    async fn rename_bin(&self, id: i64, name: &str) -> CatalogResult<bool>;
    /// Deletes the bin; its documents go with it. Returns false when absent.
    async fn delete_bin(&self, id: i64) -> CatalogResult<bool>;

    /// `Duplicate` if the reference name is already used in the bin.
    async fn insert_document(&self, doc: &NewDocument) -> CatalogResult<Document>;
    async fn get_document(&self, id: i64) -> CatalogResult<Option<Document>>;
    /// Owner of a document, resolved through its bin.
    async fn document_owner(&self, id: i64) -> CatalogResult<Option<i64>>;
    async fn reference_name_exists(&self, bin_id: i64, name: &str) -> CatalogResult<bool>;
    async fn list_documents(&self, bin_id: i64) -> CatalogResult<Vec<Document>>;
    /// Compare-and-set of the reference name. Returns false when the current
    /// name is no longer `expected`.
    async fn update_reference_name(
        &self,
        id: i64,
        expected: &str,
        new_name: &str,
    ) -> CatalogResult<bool>;
    /// Returns false when absent.
    async fn delete_document(&self, id: i64) -> CatalogResult<bool>;
    /// Documents among `ids` that belong to bins owned by `owner_id`.
    async fn fetch_documents(&self, ids: &[i64], owner_id: i64) -> CatalogResult<Vec<Document>>;
}
