//! Document registry orchestration: upload, read, rename and delete.
//!
//! Each operation touches the catalog and the object store, and uploads also
//! touch the work queue. There is no transaction spanning them, so the order
//! of steps is what keeps the stores consistent:
//!
//! * upload stores the blob first and inserts the row only after it landed;
//! * rename moves the name in the catalog first and reverts it if the blob
//!   cannot be copied;
//! * delete removes the blob first and keeps the row if that fails.

use super::{
    ensure_owner,
    error::{ServiceError, ServiceResult},
    extraction::{ExtractionDispatcher, ExtractionJob},
};
use crate::{
    auth::Principal,
    catalog::{Catalog, CatalogError},
    models::document::{Document, Language, NewDocument},
    outcome::{Dependency, DependencyWarning, Outcome},
    storage::{BlobMeta, ByteStream, ObjectKey, ObjectStore, ensure_content_type_allowed},
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A parsed multipart upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
    pub reference_name: String,
    pub bin_id: i64,
    pub language: Language,
}

/// A document together with an open stream of its content.
pub struct Asset {
    pub document: Document,
    pub meta: BlobMeta,
    pub stream: ByteStream,
}

#[derive(Debug, Clone)]
pub struct DocumentService {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ObjectStore>,
    dispatcher: ExtractionDispatcher,
}

/// Reference names are trimmed and must not be empty.
fn normalize_reference_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("referenceName is required".into()));
    }
    Ok(name.to_string())
}

impl DocumentService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn ObjectStore>,
        dispatcher: ExtractionDispatcher,
    ) -> Self {
        Self {
            catalog,
            store,
            dispatcher,
        }
    }

    /// Load a document after checking that the caller owns it. Ownership is
    /// resolved through the bin before the row is read. `missing` builds the
    /// error for an unknown id, which depends on whether the id came from the
    /// path or from the body.
    async fn load_owned(
        &self,
        principal: &Principal,
        id: i64,
        missing: fn(String) -> ServiceError,
    ) -> ServiceResult<Document> {
        let owner = self
            .catalog
            .document_owner(id)
            .await?
            .ok_or_else(|| missing(format!("document {id} does not exist")))?;
        if owner != principal.user_id {
            return Err(ServiceError::Forbidden("permission denied".into()));
        }
        self.catalog
            .get_document(id)
            .await?
            .ok_or_else(|| missing(format!("document {id} does not exist")))
    }

    /// Store an upload, record it and queue it for extraction.
    ///
    /// The row is inserted only after the blob is stored. A failed publish
    /// does not undo anything and comes back as a warning.
    pub async fn create(&self, principal: &Principal, upload: Upload) -> ServiceResult<Outcome<Document>> {
        let reference_name = normalize_reference_name(&upload.reference_name)?;
        ensure_content_type_allowed(&upload.content_type)?;

        let bin = self
            .catalog
            .get_bin(upload.bin_id)
            .await?
            .ok_or_else(|| ServiceError::Validation(format!("bin {} does not exist", upload.bin_id)))?;
        ensure_owner(&bin, principal)?;

        if self.catalog.reference_name_exists(bin.id, &reference_name).await? {
            return Err(ServiceError::Validation(format!(
                "reference name `{reference_name}` already exists in bin {}",
                bin.id
            )));
        }

        let key = ObjectKey::derive(&principal.email, bin.id, &reference_name);
        let meta = self
            .store
            .put(key.as_str(), upload.content, &upload.content_type)
            .await?;
        debug!(key = %key, size = meta.size_bytes, "stored upload");

        let new_doc = NewDocument {
            name: upload.file_name,
            reference_name,
            bin_id: bin.id,
            language: upload.language,
        };
        let doc = match self.catalog.insert_document(&new_doc).await {
            Ok(doc) => doc,
            // Lost a race for the same name: the key now belongs to the winner.
            Err(err @ CatalogError::Duplicate(_)) => return Err(err.into()),
            Err(err) => {
                if let Err(cleanup) = self.store.delete(key.as_str()).await {
                    warn!(key = %key, error = %cleanup, "could not remove blob after failed insert");
                }
                return Err(err.into());
            }
        };
        debug!(document_id = doc.id, bin_id = bin.id, "recorded document");

        let job = ExtractionJob::for_document(&doc, principal.user_id, &key, self.dispatcher.bucket());
        let mut warnings = Vec::new();
        if let Err(err) = self.dispatcher.dispatch(&job).await {
            warn!(document_id = doc.id, error = %err, "could not queue document for extraction");
            warnings.push(DependencyWarning::new(
                Dependency::WorkQueue,
                "publish",
                err.to_string(),
            ));
        }

        Ok(Outcome::with_warnings(doc, warnings))
    }

    pub async fn get(&self, principal: &Principal, id: i64) -> ServiceResult<Document> {
        self.load_owned(principal, id, ServiceError::NotFound).await
    }

    /// Open the stored content of a document.
    pub async fn get_asset(&self, principal: &Principal, id: i64) -> ServiceResult<Asset> {
        let document = self.load_owned(principal, id, ServiceError::NotFound).await?;
        let key = ObjectKey::derive(&principal.email, document.bin_id, &document.reference_name);
        let (meta, stream) = self.store.get(key.as_str()).await?;
        Ok(Asset {
            document,
            meta,
            stream,
        })
    }

    /// Change a document's reference name and move its blob to match.
    ///
    /// The catalog is updated with a compare-and-set on the name read at the
    /// start, so of two concurrent renames only one reaches the store. If the
    /// copy fails the name is set back; if that also fails the document is
    /// left inconsistent and the error says so.
    pub async fn rename_document(
        &self,
        principal: &Principal,
        id: i64,
        new_name: &str,
    ) -> ServiceResult<Outcome<()>> {
        let new_name = normalize_reference_name(new_name)?;
        let doc = self.load_owned(principal, id, ServiceError::Validation).await?;
        debug!(document_id = id, "ownership checked");

        let bin_id = doc.bin_id;
        let old_name = doc.reference_name;
        if old_name == new_name {
            return Ok(Outcome::clean(()));
        }

        if self.catalog.reference_name_exists(bin_id, &new_name).await? {
            return Err(ServiceError::Validation(format!(
                "reference name `{new_name}` already exists in bin {}",
                bin_id
            )));
        }

        let updated = self
            .catalog
            .update_reference_name(id, &old_name, &new_name)
            .await?;
        if !updated {
            return Err(ServiceError::Conflict(format!(
                "document {id} was modified concurrently"
            )));
        }
        debug!(document_id = id, from = %old_name, to = %new_name, "metadata updated");

        let old_key = ObjectKey::derive(&principal.email, bin_id, &old_name);
        let new_key = ObjectKey::derive(&principal.email, bin_id, &new_name);
        let copy_err = match self.store.rename(old_key.as_str(), new_key.as_str()).await {
            Ok(outcome) => {
                debug!(document_id = id, key = %new_key, "object moved");
                return Ok(outcome);
            }
            Err(err) => err,
        };

        warn!(document_id = id, error = %copy_err, "could not move blob, reverting reference name");
        let reverted = self
            .catalog
            .update_reference_name(id, &new_name, &old_name)
            .await;
        match reverted {
            Ok(true) => {
                debug!(document_id = id, "metadata reverted");
                Err(ServiceError::Dependency(format!(
                    "could not move document content: {copy_err}"
                )))
            }
            Ok(false) => Err(self.inconsistent(id, &new_name, &old_name, "name changed before revert".into())),
            Err(err) => Err(self.inconsistent(id, &new_name, &old_name, err.to_string())),
        }
    }

    fn inconsistent(&self, document_id: i64, recorded: &str, blob_name: &str, detail: String) -> ServiceError {
        let err = ServiceError::Inconsistent {
            document_id,
            recorded: recorded.to_string(),
            blob_name: blob_name.to_string(),
            detail,
        };
        error!(inconsistency = true, document_id, "{err}");
        err
    }

    /// Delete a document's blob, then its row. The row stays if the blob
    /// cannot be deleted.
    pub async fn delete_document(&self, principal: &Principal, id: i64) -> ServiceResult<()> {
        let doc = self.load_owned(principal, id, ServiceError::Validation).await?;

        let key = ObjectKey::derive(&principal.email, doc.bin_id, &doc.reference_name);
        if let Err(err) = self.store.delete(key.as_str()).await {
            warn!(document_id = id, key = %key, error = %err, "blob delete failed, keeping document");
            return Err(ServiceError::Dependency(format!(
                "could not delete document content: {err}"
            )));
        }
        debug!(document_id = id, key = %key, "blob deleted");

        self.catalog.delete_document(id).await?;
        debug!(document_id = id, "document deleted");
        Ok(())
    }
}
