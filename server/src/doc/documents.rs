use std::{collections::HashMap, sync::Arc};

use docshare_core::{
    doc_roles::{DocRole, DocumentRoleRecord},
    doc_store::{DocumentRecord, DocumentStore, normalize_title},
    ids::{DocId, UserId},
};
use tracing::info;

use crate::{
    AppError,
    doc::{
        context::DocAccessContext,
        roles::CollaboratorService,
        service::{DocAccessService, invalidate_document_access},
    },
};

fn validate_title(title: &str) -> Result<&str, AppError> {
    normalize_title(title).map_err(|err| AppError::bad_request(err.to_string()))
}

/// Document and collaborator operations. The `*_document` / `*_collaborator`
/// entry points take raw ids and run the gate themselves; the context-based
/// ones expect a caller already admitted by a route gate.
pub struct DocumentService {
    document_store: DocumentStore,
    access: Arc<DocAccessService>,
    collaborators: Arc<CollaboratorService>,
}

impl DocumentService {
    pub fn new(
        document_store: DocumentStore,
        access: Arc<DocAccessService>,
        collaborators: Arc<CollaboratorService>,
    ) -> Self {
        Self {
            document_store,
            access,
            collaborators,
        }
    }

    pub async fn create_document(
        &self,
        owner_id: &UserId,
        title: &str,
    ) -> Result<DocumentRecord, AppError> {
        if owner_id.is_blank() {
            return Err(AppError::bad_request("owner id must not be empty"));
        }
        let title = validate_title(title)?;

        let document = self
            .document_store
            .create(owner_id, title)
            .await
            .map_err(AppError::from_anyhow)?;

        info!(doc_id = %document.id, owner_id = %owner_id, "document created");
        Ok(document)
    }

    pub async fn get_document(
        &self,
        user_id: &UserId,
        doc_id: &DocId,
    ) -> Result<DocAccessContext, AppError> {
        self.access.authorize(user_id, doc_id, DocRole::Viewer).await
    }

    /// Documents the user owns or holds any grant on, newest first.
    pub async fn list_user_documents(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<DocumentRecord>, AppError> {
        if user_id.is_blank() {
            return Err(AppError::bad_request("user id must not be empty"));
        }

        let (owned, granted) = tokio::try_join!(
            self.document_store.list_owned(user_id),
            self.document_store.list_granted(user_id),
        )
        .map_err(AppError::from_anyhow)?;

        let mut by_id: HashMap<String, DocumentRecord> = HashMap::new();
        for document in owned.into_iter().chain(granted) {
            by_id.entry(document.id.clone()).or_insert(document);
        }

        let mut documents: Vec<DocumentRecord> = by_id.into_values().collect();
        documents.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(documents)
    }

    pub async fn update_document_metadata(
        &self,
        user_id: &UserId,
        doc_id: &DocId,
        title: &str,
    ) -> Result<DocumentRecord, AppError> {
        let ctx = self.access.authorize(user_id, doc_id, DocRole::Editor).await?;
        self.update_metadata(&ctx, title).await
    }

    pub async fn update_metadata(
        &self,
        ctx: &DocAccessContext,
        title: &str,
    ) -> Result<DocumentRecord, AppError> {
        ctx.ensure_role(DocRole::Editor)?;
        let title = validate_title(title)?;

        let updated = self
            .document_store
            .update_title(ctx.doc_id(), title)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::doc_not_found_or_denied(ctx.doc_id()))?;
        invalidate_document_access(ctx.doc_id());

        info!(doc_id = %updated.id, user_id = %ctx.user_id(), "document metadata updated");
        Ok(updated)
    }

    pub async fn delete_document(&self, user_id: &UserId, doc_id: &DocId) -> Result<(), AppError> {
        let ctx = self.access.authorize(user_id, doc_id, DocRole::Owner).await?;
        self.delete(&ctx).await
    }

    pub async fn delete(&self, ctx: &DocAccessContext) -> Result<(), AppError> {
        ctx.ensure_role(DocRole::Owner)?;

        let deleted = self
            .document_store
            .delete(ctx.doc_id())
            .await
            .map_err(AppError::from_anyhow)?;
        if !deleted {
            return Err(AppError::doc_not_found_or_denied(ctx.doc_id()));
        }
        invalidate_document_access(ctx.doc_id());

        info!(doc_id = %ctx.doc_id(), user_id = %ctx.user_id(), "document deleted");
        Ok(())
    }

    pub async fn add_collaborator(
        &self,
        owner_id: &UserId,
        doc_id: &DocId,
        target: &UserId,
        role: &str,
    ) -> Result<DocumentRoleRecord, AppError> {
        let ctx = self.access.authorize(owner_id, doc_id, DocRole::Owner).await?;
        self.collaborators.add(&ctx, target, role).await
    }

    pub async fn remove_collaborator(
        &self,
        owner_id: &UserId,
        doc_id: &DocId,
        target: &UserId,
    ) -> Result<bool, AppError> {
        let ctx = self.access.authorize(owner_id, doc_id, DocRole::Owner).await?;
        self.collaborators.remove(&ctx, target).await
    }

    pub async fn list_collaborators(
        &self,
        owner_id: &UserId,
        doc_id: &DocId,
    ) -> Result<Vec<DocumentRoleRecord>, AppError> {
        let ctx = self.access.authorize(owner_id, doc_id, DocRole::Owner).await?;
        self.collaborators.list(&ctx).await
    }
}
