//! Shared application state handed to every handler.

use crate::{
    auth::TokenVerifier,
    catalog::Catalog,
    queue::WorkQueue,
    search::SearchIndex,
    services::{BinService, DocumentService, ExtractionDispatcher, SearchBridge},
    storage::ObjectStore,
};
use std::sync::Arc;

/// Backends plus the services composed over them.
///
/// Backends are picked once at startup and held as trait objects; the
/// services only ever see the traits.
#[derive(Debug, Clone)]
pub struct AppState {
    pub verifier: TokenVerifier,
    pub bins: BinService,
    pub documents: DocumentService,
    pub search: SearchBridge,
    pub catalog: Arc<dyn Catalog>,
    pub store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn WorkQueue>,
    pub index: Arc<dyn SearchIndex>,
}

/// Settings the services need besides the backends.
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub jwt_secret: String,
    pub extraction_queue: String,
    pub bucket: String,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn WorkQueue>,
        index: Arc<dyn SearchIndex>,
        settings: StateSettings,
    ) -> Self {
        let dispatcher = ExtractionDispatcher::new(
            queue.clone(),
            settings.extraction_queue,
            settings.bucket,
        );
        Self {
            verifier: TokenVerifier::new(&settings.jwt_secret, catalog.clone()),
            bins: BinService::new(catalog.clone(), store.clone()),
            documents: DocumentService::new(catalog.clone(), store.clone(), dispatcher),
            search: SearchBridge::new(catalog.clone(), index.clone()),
            catalog,
            store,
            queue,
            index,
        }
    }
}
