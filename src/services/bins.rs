//! Bin directory: ownership-scoped CRUD and best-effort bin teardown.

use super::{
    ensure_owner,
    error::{ServiceError, ServiceResult},
};
use crate::{
    auth::Principal,
    catalog::Catalog,
    models::{
        bin::{BIN_NAME_MAX_LEN, BIN_NAME_MIN_LEN, Bin},
        document::Document,
    },
    outcome::Outcome,
    storage::{ObjectStore, bin_prefix},
};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BinService {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ObjectStore>,
}

fn validate_bin_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if !(BIN_NAME_MIN_LEN..=BIN_NAME_MAX_LEN).contains(&len) {
        return Err(ServiceError::Validation(format!(
            "bin name must be between {BIN_NAME_MIN_LEN} and {BIN_NAME_MAX_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

impl BinService {
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn ObjectStore>) -> Self {
        Self { catalog, store }
    }

    async fn load_owned(
        &self,
        principal: &Principal,
        id: i64,
        missing: fn(String) -> ServiceError,
    ) -> ServiceResult<Bin> {
        let bin = self
            .catalog
            .get_bin(id)
            .await?
            .ok_or_else(|| missing(format!("bin {id} does not exist")))?;
        ensure_owner(&bin, principal)?;
        Ok(bin)
    }

    pub async fn create(&self, principal: &Principal, name: &str) -> ServiceResult<Bin> {
        let name = validate_bin_name(name)?;
        let bin = self.catalog.create_bin(principal.user_id, &name).await?;
        debug!(bin_id = bin.id, owner_id = principal.user_id, "created bin");
        Ok(bin)
    }

    pub async fn list(&self, principal: &Principal) -> ServiceResult<Vec<Bin>> {
        Ok(self.catalog.list_bins(principal.user_id).await?)
    }

    pub async fn documents_in_bin(&self, principal: &Principal, id: i64) -> ServiceResult<Vec<Document>> {
        let bin = self.load_owned(principal, id, ServiceError::NotFound).await?;
        Ok(self.catalog.list_documents(bin.id).await?)
    }

    pub async fn rename(&self, principal: &Principal, id: i64, name: &str) -> ServiceResult<()> {
        let name = validate_bin_name(name)?;
        let bin = self.load_owned(principal, id, ServiceError::Validation).await?;
        if !self.catalog.rename_bin(bin.id, &name).await? {
            return Err(ServiceError::Validation(format!("bin {id} does not exist")));
        }
        debug!(bin_id = id, "renamed bin");
        Ok(())
    }

    /// Delete a bin with all its documents.
    ///
    /// Blobs under the bin prefix are removed best effort; whatever could not
    /// be deleted is returned as warnings and the bin row is dropped anyway.
    /// A user's last bin cannot be deleted.
    pub async fn delete_bin(&self, principal: &Principal, id: i64) -> ServiceResult<Outcome<()>> {
        let bin = self.load_owned(principal, id, ServiceError::Validation).await?;

        if self.catalog.count_bins(principal.user_id).await? <= 1 {
            return Err(ServiceError::Validation("cannot delete the last bin".into()));
        }

        let prefix = bin_prefix(&principal.email, bin.id);
        let removed = self.store.delete_prefix(&prefix).await;
        debug!(
            bin_id = id,
            deleted = removed.value,
            failed = removed.warnings.len(),
            "bin blobs removed"
        );

        self.catalog.delete_bin(bin.id).await?;
        debug!(bin_id = id, "bin deleted");
        Ok(Outcome::with_warnings((), removed.warnings))
    }
}
