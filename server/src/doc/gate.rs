//! Route-level authorization gates.
//!
//! A handler asks for `DocGate<Editor>` (or one of the aliases) and only runs
//! once the caller's effective role on the `{id}` path document reaches that
//! level. The admitted [`DocAccessContext`] is handed over as-is.

use std::{marker::PhantomData, ops::Deref};

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use docshare_core::{doc_roles::DocRole, ids::DocId};

use crate::{AppError, auth::AuthenticatedUser, doc::context::DocAccessContext, state::AppState};

pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: DocRole;
}

pub struct Viewer;
pub struct Editor;
pub struct Owner;

impl RequiredRole for Viewer {
    const ROLE: DocRole = DocRole::Viewer;
}

impl RequiredRole for Editor {
    const ROLE: DocRole = DocRole::Editor;
}

impl RequiredRole for Owner {
    const ROLE: DocRole = DocRole::Owner;
}

pub type ViewerGate = DocGate<Viewer>;
pub type EditorGate = DocGate<Editor>;
pub type OwnerGate = DocGate<Owner>;

pub struct DocGate<R: RequiredRole> {
    context: DocAccessContext,
    _required: PhantomData<R>,
}

impl<R: RequiredRole> DocGate<R> {
    pub fn context(&self) -> &DocAccessContext {
        &self.context
    }

    pub fn into_context(self) -> DocAccessContext {
        self.context
    }
}

impl<R: RequiredRole> Deref for DocGate<R> {
    type Target = DocAccessContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl<R: RequiredRole> FromRequestParts<AppState> for DocGate<R> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let Path(doc_id) = Path::<DocId>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        let context = state
            .doc_access_service
            .authorize(user.id(), &doc_id, R::ROLE)
            .await?;

        Ok(Self {
            context,
            _required: PhantomData,
        })
    }
}
