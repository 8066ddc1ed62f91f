use std::sync::Arc;

use docshare_core::{
    config::DatabaseBackend, db::Database, doc_roles::DocumentRoleStore,
    doc_store::DocumentStore,
};
use serde::Serialize;

use crate::doc::{
    documents::DocumentService, roles::CollaboratorService, service::DocAccessService,
};

#[derive(Clone)]
pub struct AppState {
    pub document_store: DocumentStore,
    pub doc_role_store: DocumentRoleStore,
    pub doc_access_service: Arc<DocAccessService>,
    pub collaborator_service: Arc<CollaboratorService>,
    pub document_service: Arc<DocumentService>,
    pub metadata: ServerMetadata,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerMetadata {
    pub version: &'static str,
    pub backend: &'static str,
}

impl ServerMetadata {
    fn new(backend: DatabaseBackend) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            backend: match backend {
                DatabaseBackend::Sqlite => "sqlite",
                DatabaseBackend::Memory => "memory",
            },
        }
    }
}

pub fn build_state(database: &Database) -> AppState {
    let repositories = database.repositories();
    let document_store = DocumentStore::new(&repositories);
    let doc_role_store = DocumentRoleStore::new(&repositories);

    let doc_access_service = Arc::new(DocAccessService::new(document_store.clone()));
    let collaborator_service = Arc::new(CollaboratorService::new(doc_role_store.clone()));
    let document_service = Arc::new(DocumentService::new(
        document_store.clone(),
        doc_access_service.clone(),
        collaborator_service.clone(),
    ));

    AppState {
        document_store,
        doc_role_store,
        doc_access_service,
        collaborator_service,
        document_service,
        metadata: ServerMetadata::new(database.backend()),
    }
}
