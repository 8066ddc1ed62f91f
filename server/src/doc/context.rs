use anyhow::Error as AnyError;
use axum::{http::HeaderValue, response::Response};
use docshare_core::{doc_roles::DocRole, doc_store::DocumentRecord, ids::UserId};

use crate::{
    AppError,
    handlers::headers::{HEADER_DOC_ID, HEADER_DOC_ROLE, doc_role_header_value},
};

/// Admitted access for one request: who is asking, the document they reached,
/// and the role the gate resolved. Downstream operations read from here
/// instead of resolving again.
#[derive(Debug, Clone)]
pub struct DocAccessContext {
    user_id: UserId,
    document: DocumentRecord,
    role: DocRole,
}

impl DocAccessContext {
    pub(crate) fn new(user_id: UserId, document: DocumentRecord, role: DocRole) -> Self {
        Self {
            user_id,
            document,
            role,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn doc_id(&self) -> &str {
        &self.document.id
    }

    pub fn document(&self) -> &DocumentRecord {
        &self.document
    }

    pub fn into_document(self) -> DocumentRecord {
        self.document
    }

    pub fn role(&self) -> DocRole {
        self.role
    }

    /// Re-checks the admitted role for operations reachable without a gate
    /// of the right level in front of them.
    pub(crate) fn ensure_role(&self, required: DocRole) -> Result<(), AppError> {
        if self.role >= required {
            Ok(())
        } else {
            Err(AppError::doc_not_found_or_denied(self.doc_id()))
        }
    }

    pub(crate) fn finalize_response(&self, mut response: Response) -> Result<Response, AppError> {
        let headers = response.headers_mut();
        headers.insert(
            HEADER_DOC_ID,
            HeaderValue::from_str(self.doc_id())
                .map_err(|err| AppError::internal(AnyError::new(err)))?,
        );
        headers.insert(
            HEADER_DOC_ROLE,
            HeaderValue::from_static(doc_role_header_value(self.role)),
        );
        Ok(response)
    }
}
