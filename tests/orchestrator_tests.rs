//! Cross-store behaviour of the rename, delete and search paths under
//! injected failures.

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use common::{TestApp, stored};
use docbin::{
    auth::Principal,
    catalog::{Catalog, CatalogResult, SqliteCatalog},
    models::{
        bin::Bin,
        document::{Document, Language, NewDocument},
        user::{NewUser, User},
    },
    outcome::Dependency,
    search::{SearchHit, SearchIndex, SearchQuery, SearchResult},
    services::{DocumentService, ExtractionDispatcher, SearchBridge, Upload, error::ServiceError},
    storage::{ObjectKey, bin_prefix},
};
use std::sync::Arc;

fn principal(user_id: i64, email: &str) -> Principal {
    Principal {
        user_id,
        email: email.into(),
    }
}

async fn upload(app: &TestApp, who: &Principal, bin: &Bin, reference_name: &str) -> Document {
    app.state
        .documents
        .create(
            who,
            Upload {
                file_name: format!("{reference_name}.png"),
                content_type: "image/png".into(),
                content: Bytes::from(format!("content of {reference_name}")),
                reference_name: reference_name.into(),
                bin_id: bin.id,
                language: Language::Eng,
            },
        )
        .await
        .unwrap()
        .into_value()
}

async fn setup() -> (TestApp, Principal, Bin) {
    let app = TestApp::new().await;
    let (user, bin) = app.create_user("a@x.com").await;
    (app, principal(user.id, "a@x.com"), bin)
}

#[tokio::test]
async fn rename_to_current_name_touches_nothing() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;
    app.store.reset_calls();

    let outcome = app
        .state
        .documents
        .rename_document(&alice, doc.id, "r1")
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn rename_to_taken_name_is_rejected_before_the_store() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;
    upload(&app, &alice, &bin, "r2").await;
    app.store.reset_calls();

    let err = app
        .state
        .documents
        .rename_document(&alice, doc.id, "r2")
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn copy_failure_reverts_the_reference_name() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;
    app.store.fail_copy(true);

    let err = app
        .state
        .documents
        .rename_document(&alice, doc.id, "r2")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Dependency(_)), "{err:?}");

    let reloaded = app.catalog.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(reloaded.reference_name, "r1");
    let old_key = ObjectKey::derive("a@x.com", bin.id, "r1");
    let new_key = ObjectKey::derive("a@x.com", bin.id, "r2");
    assert!(stored(&app, old_key.as_str()).await.is_some());
    assert!(stored(&app, new_key.as_str()).await.is_none());
}

#[tokio::test]
async fn failed_revert_surfaces_an_inconsistency() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;
    app.store.fail_copy(true);
    // a concurrent writer renames the document between update and revert
    app.store
        .interfere_on_copy_failure(
            app.pool.clone(),
            &format!(
                "UPDATE documents SET reference_name = 'r3' WHERE id = {}",
                doc.id
            ),
        )
        .await;

    let err = app
        .state
        .documents
        .rename_document(&alice, doc.id, "r2")
        .await
        .unwrap_err();

    match err {
        ServiceError::Inconsistent {
            document_id,
            recorded,
            blob_name,
            ..
        } => {
            assert_eq!(document_id, doc.id);
            assert_eq!(recorded, "r2");
            assert_eq!(blob_name, "r1");
        }
        other => panic!("expected inconsistency, got {other:?}"),
    }
}

#[tokio::test]
async fn stale_rename_loses_the_compare_and_set() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;

    // two renames both read `r1`; only the first write lands
    assert!(
        app.catalog
            .update_reference_name(doc.id, "r1", "r9")
            .await
            .unwrap()
    );
    assert!(
        !app.catalog
            .update_reference_name(doc.id, "r1", "r2")
            .await
            .unwrap()
    );
    let reloaded = app.catalog.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(reloaded.reference_name, "r9");
}

/// Catalog that lets another writer rename the document right after the
/// duplicate-name check, before the compare-and-set runs.
#[derive(Debug)]
struct RacingCatalog {
    inner: Arc<SqliteCatalog>,
    rival_name: String,
}

#[async_trait]
impl Catalog for RacingCatalog {
    async fn ping(&self) -> CatalogResult<()> {
        self.inner.ping().await
    }
    async fn create_user(&self, user: &NewUser) -> CatalogResult<(User, Bin)> {
        self.inner.create_user(user).await
    }
    async fn get_user(&self, id: i64) -> CatalogResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn create_bin(&self, owner_id: i64, name: &str) -> CatalogResult<Bin> {
        self.inner.create_bin(owner_id, name).await
    }
    async fn get_bin(&self, id: i64) -> CatalogResult<Option<Bin>> {
        self.inner.get_bin(id).await
    }
    async fn list_bins(&self, owner_id: i64) -> CatalogResult<Vec<Bin>> {
        self.inner.list_bins(owner_id).await
    }
    async fn count_bins(&self, owner_id: i64) -> CatalogResult<i64> {
        self.inner.count_bins(owner_id).await
    }
    async fn rename_bin(&self, id: i64, name: &str) -> CatalogResult<bool> {
        self.inner.rename_bin(id, name).await
    }
    async fn delete_bin(&self, id: i64) -> CatalogResult<bool> {
        self.inner.delete_bin(id).await
    }
    async fn insert_document(&self, doc: &NewDocument) -> CatalogResult<Document> {
        self.inner.insert_document(doc).await
    }
    async fn get_document(&self, id: i64) -> CatalogResult<Option<Document>> {
        self.inner.get_document(id).await
    }
    async fn document_owner(&self, id: i64) -> CatalogResult<Option<i64>> {
        self.inner.document_owner(id).await
    }
    async fn reference_name_exists(&self, bin_id: i64, name: &str) -> CatalogResult<bool> {
        let exists = self.inner.reference_name_exists(bin_id, name).await?;
        for doc in self.inner.list_documents(bin_id).await? {
            self.inner
                .update_reference_name(doc.id, &doc.reference_name, &self.rival_name)
                .await?;
        }
        Ok(exists)
    }
    async fn list_documents(&self, bin_id: i64) -> CatalogResult<Vec<Document>> {
        self.inner.list_documents(bin_id).await
    }
    async fn update_reference_name(
        &self,
        id: i64,
        expected: &str,
        new_name: &str,
    ) -> CatalogResult<bool> {
        self.inner.update_reference_name(id, expected, new_name).await
    }
    async fn delete_document(&self, id: i64) -> CatalogResult<bool> {
        self.inner.delete_document(id).await
    }
    async fn fetch_documents(&self, ids: &[i64], owner_id: i64) -> CatalogResult<Vec<Document>> {
        self.inner.fetch_documents(ids, owner_id).await
    }
}

#[tokio::test]
async fn rename_that_loses_the_race_is_a_conflict() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;
    app.store.reset_calls();

    let documents = DocumentService::new(
        Arc::new(RacingCatalog {
            inner: app.catalog.clone(),
            rival_name: "r9".into(),
        }),
        app.store.clone(),
        ExtractionDispatcher::new(Arc::new(app.queue.clone()), common::QUEUE_NAME, common::BUCKET),
    );

    let err = documents
        .rename_document(&alice, doc.id, "r2")
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
    assert_eq!(app.store.calls(), 0);
    let reloaded = app.catalog.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(reloaded.reference_name, "r9");
    let old_key = ObjectKey::derive("a@x.com", bin.id, "r1");
    assert!(stored(&app, old_key.as_str()).await.is_some());
}

#[tokio::test]
async fn old_blob_delete_failure_is_only_a_warning() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;
    app.store.fail_delete(true);

    let outcome = app
        .state
        .documents
        .rename_document(&alice, doc.id, "r2")
        .await
        .unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].dependency, Dependency::ObjectStore);
    let reloaded = app.catalog.get_document(doc.id).await.unwrap().unwrap();
    assert_eq!(reloaded.reference_name, "r2");
    // orphan left behind
    let old_key = ObjectKey::derive("a@x.com", bin.id, "r1");
    assert!(stored(&app, old_key.as_str()).await.is_some());
}

#[tokio::test]
async fn document_row_survives_a_failed_blob_delete() {
    let (app, alice, bin) = setup().await;
    let doc = upload(&app, &alice, &bin, "r1").await;
    app.store.fail_delete(true);

    let err = app
        .state
        .documents
        .delete_document(&alice, doc.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Dependency(_)));
    assert!(app.catalog.get_document(doc.id).await.unwrap().is_some());

    app.store.fail_delete(false);
    app.state
        .documents
        .delete_document(&alice, doc.id)
        .await
        .unwrap();
    assert!(app.catalog.get_document(doc.id).await.unwrap().is_none());
}

#[tokio::test]
async fn bin_delete_is_best_effort_over_blobs() {
    let (app, alice, _) = setup().await;
    let extra = app
        .state
        .bins
        .create(&alice, "Receipts")
        .await
        .unwrap();
    let a = upload(&app, &alice, &extra, "a").await;
    let b = upload(&app, &alice, &extra, "b").await;
    app.store.fail_delete(true);

    let outcome = app.state.bins.delete_bin(&alice, extra.id).await.unwrap();

    assert_eq!(outcome.warnings.len(), 2);
    assert!(app.catalog.get_bin(extra.id).await.unwrap().is_none());
    // rows cascade with the bin
    assert!(app.catalog.get_document(a.id).await.unwrap().is_none());
    assert!(app.catalog.get_document(b.id).await.unwrap().is_none());
    // blobs stay as orphans
    let prefix = bin_prefix("a@x.com", extra.id);
    let keys = app.store.inner().keys().await;
    assert_eq!(keys.iter().filter(|k| k.starts_with(&prefix)).count(), 2);
}

#[tokio::test]
async fn bin_delete_removes_only_its_own_prefix() {
    let (app, alice, default_bin) = setup().await;
    let extra = app.state.bins.create(&alice, "Receipts").await.unwrap();
    upload(&app, &alice, &default_bin, "keep").await;
    upload(&app, &alice, &extra, "drop").await;

    let outcome = app.state.bins.delete_bin(&alice, extra.id).await.unwrap();
    assert!(outcome.is_clean());

    let keep = ObjectKey::derive("a@x.com", default_bin.id, "keep");
    assert_eq!(app.store.inner().keys().await, vec![keep.to_string()]);
}

/// Index that returns a fixed list of hits.
#[derive(Debug)]
struct FixedIndex(Vec<i64>);

#[async_trait]
impl SearchIndex for FixedIndex {
    fn provider_type(&self) -> &str {
        "fixed"
    }

    async fn health_check(&self) -> SearchResult<()> {
        Ok(())
    }

    async fn search(&self, _query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
        Ok(self
            .0
            .iter()
            .map(|&document_id| SearchHit { document_id })
            .collect())
    }
}

#[tokio::test]
async fn search_keeps_at_most_four_hits() {
    let (app, alice, bin) = setup().await;
    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(upload(&app, &alice, &bin, &format!("doc{i}")).await.id);
    }

    let bridge = SearchBridge::new(app.catalog.clone(), Arc::new(FixedIndex(ids.clone())));
    let docs = bridge.search(&alice, Some("anything")).await.unwrap();
    let found: Vec<i64> = docs.iter().map(|d| d.id).collect();
    assert_eq!(found, ids[..4].to_vec());

    let empty = SearchBridge::new(app.catalog.clone(), Arc::new(FixedIndex(Vec::new())));
    assert!(empty.search(&alice, Some("anything")).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_drops_hits_owned_by_someone_else() {
    let (app, alice, bin) = setup().await;
    let (bob_user, bob_bin) = app.create_user("b@x.com").await;
    let bob = principal(bob_user.id, "b@x.com");
    let mine = upload(&app, &alice, &bin, "mine").await;
    let theirs = upload(&app, &bob, &bob_bin, "theirs").await;

    let bridge = SearchBridge::new(
        app.catalog.clone(),
        Arc::new(FixedIndex(vec![theirs.id, mine.id])),
    );
    let docs = bridge.search(&alice, Some("x")).await.unwrap();
    assert_eq!(docs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![mine.id]);
}
