// Document handlers

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    auth::AuthenticatedUser,
    doc::gate::{EditorGate, OwnerGate, ViewerGate},
    error::AppError,
    state::AppState,
    types::{
        CreateDocumentRequest, DocumentDetailResponse, DocumentResponse, MessageResponse,
        UpdateDocumentRequest,
    },
};

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

pub(crate) async fn list_documents_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let documents = state
        .document_service
        .list_user_documents(user.id())
        .await?;

    Ok(Json(
        documents.into_iter().map(DocumentResponse::from).collect(),
    ))
}

pub(crate) async fn create_document_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let document = state
        .document_service
        .create_document(user.id(), &request.title)
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))).into_response())
}

pub(crate) async fn get_document_handler(gate: ViewerGate) -> Result<Response, AppError> {
    let ctx = gate.into_context();
    let role = ctx.role();
    let body = DocumentDetailResponse::new(ctx.document().clone(), role);

    ctx.finalize_response(Json(body).into_response())
}

pub(crate) async fn update_document_handler(
    State(state): State<AppState>,
    gate: EditorGate,
    payload: Result<Json<UpdateDocumentRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    state
        .document_service
        .update_metadata(gate.context(), &request.title)
        .await?;

    let response = Json(MessageResponse {
        message: "document metadata updated",
    })
    .into_response();
    gate.finalize_response(response)
}

pub(crate) async fn delete_document_handler(
    State(state): State<AppState>,
    gate: OwnerGate,
) -> Result<Response, AppError> {
    state.document_service.delete(gate.context()).await?;

    let response = Json(MessageResponse {
        message: "document deleted",
    })
    .into_response();
    gate.finalize_response(response)
}
