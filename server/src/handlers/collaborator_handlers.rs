// Collaborator handlers; every route here requires the owner role.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docshare_core::ids::UserId;

use crate::{
    doc::gate::OwnerGate,
    error::AppError,
    handlers::doc_handlers::json_body,
    state::AppState,
    types::{
        AddCollaboratorRequest, CollaboratorResponse, MessageResponse, RemoveCollaboratorRequest,
    },
};

pub(crate) async fn list_collaborators_handler(
    State(state): State<AppState>,
    gate: OwnerGate,
) -> Result<Response, AppError> {
    let collaborators = state.collaborator_service.list(gate.context()).await?;
    let body: Vec<CollaboratorResponse> = collaborators
        .into_iter()
        .map(CollaboratorResponse::from)
        .collect();

    gate.finalize_response(Json(body).into_response())
}

pub(crate) async fn add_collaborator_handler(
    State(state): State<AppState>,
    gate: OwnerGate,
    payload: Result<Json<AddCollaboratorRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let target = UserId::from(request.user_id.trim());
    state
        .collaborator_service
        .add(gate.context(), &target, &request.role)
        .await?;

    let response = (
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "document permission created",
        }),
    )
        .into_response();
    gate.finalize_response(response)
}

pub(crate) async fn remove_collaborator_handler(
    State(state): State<AppState>,
    gate: OwnerGate,
    payload: Result<Json<RemoveCollaboratorRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let target = UserId::from(request.user_id.trim());
    state
        .collaborator_service
        .remove(gate.context(), &target)
        .await?;

    let response = Json(MessageResponse {
        message: "collaborator removed",
    })
    .into_response();
    gate.finalize_response(response)
}
