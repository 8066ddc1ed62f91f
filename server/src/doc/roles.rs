use docshare_core::{
    db::errors::{is_foreign_key_violation, is_unique_violation},
    doc_roles::{DocRole, DocumentRoleRecord, DocumentRoleStore},
    ids::UserId,
};
use tracing::info;

use crate::{
    AppError,
    doc::{context::DocAccessContext, service::invalidate_doc_access},
};

/// Parses a role a collaborator may be given. `owner` is never assignable.
pub fn parse_assignable_role(label: &str) -> Result<DocRole, AppError> {
    let role = label
        .parse::<DocRole>()
        .map_err(|_| AppError::bad_request(format!("invalid role: {label}")))?;

    if !role.is_assignable() {
        return Err(AppError::bad_request(
            "role must be either 'editor' or 'viewer'",
        ));
    }

    Ok(role)
}

pub struct CollaboratorService {
    doc_role_store: DocumentRoleStore,
}

impl CollaboratorService {
    pub fn new(doc_role_store: DocumentRoleStore) -> Self {
        Self { doc_role_store }
    }

    /// Grants `target` access. An existing grant for the pair, the owner's
    /// included, is a conflict; grants are never replaced in place.
    pub async fn add(
        &self,
        ctx: &DocAccessContext,
        target: &UserId,
        role_label: &str,
    ) -> Result<DocumentRoleRecord, AppError> {
        ctx.ensure_role(DocRole::Owner)?;
        if target.is_blank() {
            return Err(AppError::bad_request("user_id must not be empty"));
        }
        let role = parse_assignable_role(role_label)?;
        let doc_id = ctx.doc_id();

        let record = match self.doc_role_store.insert(doc_id, target, role).await {
            Ok(record) => record,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::collaborator_exists(doc_id, target));
            }
            Err(err) if is_foreign_key_violation(&err) => {
                return Err(AppError::doc_not_found_or_denied(doc_id));
            }
            Err(err) => return Err(AppError::from_anyhow(err)),
        };
        invalidate_doc_access(doc_id, target);

        info!(
            doc_id = %doc_id,
            actor_id = %ctx.user_id(),
            user_id = %target,
            role = %role,
            "collaborator added"
        );
        Ok(record)
    }

    /// Revokes `target`'s grant. Returns whether a grant existed; a missing
    /// grant is not an error.
    pub async fn remove(&self, ctx: &DocAccessContext, target: &UserId) -> Result<bool, AppError> {
        ctx.ensure_role(DocRole::Owner)?;
        if target.is_blank() {
            return Err(AppError::bad_request("user_id must not be empty"));
        }
        if ctx.document().owner_id == target.as_str() {
            return Err(AppError::bad_request(
                "the document owner cannot be removed as a collaborator",
            ));
        }

        let doc_id = ctx.doc_id();
        let removed = self
            .doc_role_store
            .remove(doc_id, target)
            .await
            .map_err(AppError::from_anyhow)?;
        invalidate_doc_access(doc_id, target);

        info!(
            doc_id = %doc_id,
            actor_id = %ctx.user_id(),
            user_id = %target,
            removed,
            "collaborator removed"
        );
        Ok(removed)
    }

    /// Every grant on the document, owner row included, oldest first.
    pub async fn list(&self, ctx: &DocAccessContext) -> Result<Vec<DocumentRoleRecord>, AppError> {
        ctx.ensure_role(DocRole::Owner)?;

        let roles = self
            .doc_role_store
            .list_for_doc(ctx.doc_id())
            .await
            .map_err(AppError::from_anyhow)?;

        if roles.is_empty() {
            return Err(AppError::collaborators_not_found(ctx.doc_id()));
        }

        Ok(roles)
    }
}
