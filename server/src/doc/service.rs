use std::sync::Arc;

use axum::extract::FromRef;
use docshare_core::{
    doc_roles::DocRole,
    doc_store::{DocumentRecord, DocumentStore},
    ids::{DocId, UserId},
};
use tracing::debug;

use crate::{AppError, doc::context::DocAccessContext, request_cache, state::AppState};

/// Outcome of resolving one user's access to one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocResolution {
    pub document: Option<DocumentRecord>,
    pub role: Option<DocRole>,
}

impl DocResolution {
    fn absent() -> Self {
        Self {
            document: None,
            role: None,
        }
    }
}

pub struct DocAccessService {
    document_store: DocumentStore,
}

impl DocAccessService {
    pub fn new(document_store: DocumentStore) -> Self {
        Self { document_store }
    }

    /// Effective role of `user_id` on `doc_id`. Ownership always yields
    /// `owner`; otherwise the explicit grant decides. Served from the request
    /// cache when one is in scope.
    pub async fn resolve(&self, doc_id: &str, user_id: &str) -> Result<DocResolution, AppError> {
        if doc_id.trim().is_empty() {
            return Err(AppError::bad_request("document id must not be empty"));
        }
        if user_id.trim().is_empty() {
            return Err(AppError::bad_request("user id must not be empty"));
        }

        let fetch = || async { self.fetch_resolution(doc_id, user_id).await };

        if let Some(caches) = request_cache::current_request_caches() {
            return caches
                .doc_access()
                .get_or_fetch(doc_id, user_id, fetch)
                .await;
        }

        fetch().await
    }

    async fn fetch_resolution(&self, doc_id: &str, user_id: &str) -> Result<DocResolution, AppError> {
        let Some(record) = self
            .document_store
            .find_with_role(doc_id, user_id)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Ok(DocResolution::absent());
        };

        let role = record
            .effective_role(user_id)
            .map_err(AppError::internal)?;

        Ok(DocResolution {
            document: Some(record.document),
            role,
        })
    }

    /// Admits the caller when their effective role is at least `required`.
    /// Absence and insufficiency produce the same denial.
    pub async fn authorize(
        &self,
        user_id: &UserId,
        doc_id: &DocId,
        required: DocRole,
    ) -> Result<DocAccessContext, AppError> {
        let resolution = self.resolve(doc_id.as_str(), user_id.as_str()).await?;

        match resolution {
            DocResolution {
                document: Some(document),
                role: Some(role),
            } if role >= required => {
                debug!(
                    doc_id = %doc_id,
                    user_id = %user_id,
                    role = %role,
                    required = %required,
                    "doc access admitted"
                );
                Ok(DocAccessContext::new(user_id.clone(), document, role))
            }
            DocResolution { role, .. } => {
                debug!(
                    doc_id = %doc_id,
                    user_id = %user_id,
                    role = ?role,
                    required = %required,
                    "doc access denied"
                );
                Err(AppError::doc_not_found_or_denied(doc_id.as_str()))
            }
        }
    }
}

impl FromRef<AppState> for Arc<DocAccessService> {
    fn from_ref(state: &AppState) -> Arc<DocAccessService> {
        Arc::clone(&state.doc_access_service)
    }
}

pub fn invalidate_doc_access(doc_id: &str, user_id: &str) {
    if let Some(caches) = request_cache::current_request_caches() {
        caches.doc_access().invalidate(doc_id, user_id);
    }
}

pub fn invalidate_document_access(doc_id: &str) {
    if let Some(caches) = request_cache::current_request_caches() {
        caches.doc_access().invalidate_document(doc_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        request_cache::{RequestCaches, scope_with_request_caches},
        testing::setup_memory_state,
    };

    #[tokio::test]
    async fn owner_resolves_to_owner_even_with_other_grant_rows() {
        let state = setup_memory_state();
        let doc = state.document_store.create("alice", "Plan").await.unwrap();
        // a stray non-owner row for the owner must not downgrade them
        state.doc_role_store.remove(&doc.id, "alice").await.unwrap();
        state
            .doc_role_store
            .insert(&doc.id, "alice", DocRole::Viewer)
            .await
            .unwrap();

        let resolution = state
            .doc_access_service
            .resolve(&doc.id, "alice")
            .await
            .unwrap();
        assert_eq!(resolution.role, Some(DocRole::Owner));
        assert_eq!(resolution.document.map(|d| d.id), Some(doc.id));
    }

    #[tokio::test]
    async fn ungranted_user_resolves_to_none() {
        let state = setup_memory_state();
        let doc = state.document_store.create("alice", "Plan").await.unwrap();

        let resolution = state
            .doc_access_service
            .resolve(&doc.id, "carol")
            .await
            .unwrap();
        assert!(resolution.document.is_some());
        assert_eq!(resolution.role, None);

        let missing = state
            .doc_access_service
            .resolve("nope", "carol")
            .await
            .unwrap();
        assert_eq!(missing, DocResolution::absent());
    }

    #[tokio::test]
    async fn empty_ids_are_validation_errors() {
        let state = setup_memory_state();
        let err = state
            .doc_access_service
            .resolve("", "alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = state
            .doc_access_service
            .resolve("doc", "  ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn gate_admits_only_sufficient_roles() {
        let state = setup_memory_state();
        let doc = state.document_store.create("alice", "Plan").await.unwrap();
        state
            .doc_role_store
            .insert(&doc.id, "bob", DocRole::Viewer)
            .await
            .unwrap();
        let doc_id = DocId::from(doc.id.clone());
        let bob = UserId::from("bob");
        let access = &state.doc_access_service;

        let ctx = access
            .authorize(&bob, &doc_id, DocRole::Viewer)
            .await
            .expect("viewer admitted at viewer level");
        assert_eq!(ctx.role(), DocRole::Viewer);
        assert_eq!(ctx.document().id, doc.id);

        let denied = access
            .authorize(&bob, &doc_id, DocRole::Editor)
            .await
            .unwrap_err();
        let absent = access
            .authorize(&bob, &DocId::from("missing"), DocRole::Viewer)
            .await
            .unwrap_err();

        assert_eq!(denied.kind(), ErrorKind::NotFound);
        assert_eq!(absent.kind(), ErrorKind::NotFound);
        assert_eq!(denied.to_string(), absent.to_string());
        assert_eq!(denied.name(), absent.name());

        let owner = access
            .authorize(&UserId::from("alice"), &doc_id, DocRole::Owner)
            .await
            .unwrap();
        assert_eq!(owner.role(), DocRole::Owner);
    }

    #[tokio::test]
    async fn resolution_is_cached_within_a_request() {
        let state = setup_memory_state();
        let doc = state.document_store.create("alice", "Plan").await.unwrap();
        let caches = RequestCaches::default();

        scope_with_request_caches(caches.clone(), async {
            let first = state
                .doc_access_service
                .resolve(&doc.id, "bob")
                .await
                .unwrap();
            assert_eq!(first.role, None);

            // a grant written behind the cache's back stays invisible
            state
                .doc_role_store
                .insert(&doc.id, "bob", DocRole::Editor)
                .await
                .unwrap();
            let cached = state
                .doc_access_service
                .resolve(&doc.id, "bob")
                .await
                .unwrap();
            assert_eq!(cached.role, None);

            invalidate_doc_access(&doc.id, "bob");
            let refreshed = state
                .doc_access_service
                .resolve(&doc.id, "bob")
                .await
                .unwrap();
            assert_eq!(refreshed.role, Some(DocRole::Editor));
        })
        .await;

        assert!(caches.doc_access().get(&doc.id, "bob").is_some());
    }
}
