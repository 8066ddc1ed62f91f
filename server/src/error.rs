use std::fmt;

use anyhow::Error as AnyError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docshare_core::db::errors::is_store_unavailable;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::{error, warn};

use crate::observability::current_request_context;

/// Message shared by every gate denial, whether the document is missing or
/// the caller simply lacks the role.
pub const DOC_NOT_FOUND_OR_DENIED: &str = "document not found or access denied";

#[derive(Debug, Clone, Copy)]
struct ErrorDescriptor {
    status: StatusCode,
    name: &'static str,
    error_type: &'static str,
    default_message: &'static str,
}

const BAD_REQUEST_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    name: "BAD_REQUEST",
    error_type: "VALIDATION_ERROR",
    default_message: "Bad request.",
};

const UNAUTHORIZED_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::UNAUTHORIZED,
    name: "AUTHENTICATION_REQUIRED",
    error_type: "AUTHENTICATION_REQUIRED",
    default_message: "missing or invalid user ID header",
};

const CONFLICT_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "RESOURCE_ALREADY_EXISTS",
    error_type: "RESOURCE_ALREADY_EXISTS",
    default_message: "Resource already exists.",
};

const NOT_FOUND_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::NOT_FOUND,
    name: "NOT_FOUND",
    error_type: "RESOURCE_NOT_FOUND",
    default_message: "Resource not found.",
};

const SERVICE_UNAVAILABLE_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::SERVICE_UNAVAILABLE,
    name: "STORE_UNAVAILABLE",
    error_type: "STORE_UNAVAILABLE",
    default_message: "The document store is temporarily unavailable.",
};

const INTERNAL_SERVER_ERROR_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    name: "INTERNAL_SERVER_ERROR",
    error_type: "INTERNAL_SERVER_ERROR",
    default_message: "An internal error occurred.",
};

/// Coarse error category, independent of the HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    /// Never produced by the document routes: an insufficient role is
    /// reported as `NotFound`, so a hidden document looks like a missing one.
    Forbidden,
    Conflict,
    Validation,
    Unauthenticated,
    StoreUnavailable,
    Internal,
}

#[derive(Debug)]
pub struct AppError {
    descriptor: &'static ErrorDescriptor,
    name: String,
    error_type: String,
    message: String,
    data: Option<JsonValue>,
    source: Option<AnyError>,
}

impl AppError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::from_descriptor(&BAD_REQUEST_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_descriptor(&UNAUTHORIZED_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::from_descriptor(&CONFLICT_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn store_unavailable(error: AnyError) -> Self {
        let request_id = current_request_id();
        warn!(?error, request_id = ?request_id, "document store unavailable");
        Self::from_descriptor(&SERVICE_UNAVAILABLE_DESCRIPTOR, None).with_source(error)
    }

    pub(crate) fn internal(error: AnyError) -> Self {
        let request_id = current_request_id();
        error!(?error, request_id = ?request_id, "internal server error");
        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, None).with_source(error)
    }

    pub(crate) fn from_anyhow(error: AnyError) -> Self {
        if is_store_unavailable(&error) {
            Self::store_unavailable(error)
        } else {
            Self::internal(error)
        }
    }

    pub(crate) fn doc_not_found_or_denied(doc_id: &str) -> Self {
        Self::not_found(DOC_NOT_FOUND_OR_DENIED)
            .with_name("DOC_NOT_FOUND")
            .with_data(json!({ "docId": doc_id }))
    }

    pub(crate) fn collaborators_not_found(doc_id: &str) -> Self {
        let message = format!("Doc {doc_id} has no collaborators.");

        Self::not_found(message)
            .with_name("COLLABORATORS_NOT_FOUND")
            .with_data(json!({ "docId": doc_id }))
    }

    pub(crate) fn collaborator_exists(doc_id: &str, user_id: &str) -> Self {
        let message = format!("User {user_id} already has access to Doc {doc_id}.");

        Self::conflict(message)
            .with_name("COLLABORATOR_ALREADY_EXISTS")
            .with_data(json!({ "docId": doc_id, "userId": user_id }))
    }

    pub fn kind(&self) -> ErrorKind {
        match self.descriptor.status {
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::FORBIDDEN => ErrorKind::Forbidden,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            StatusCode::BAD_REQUEST => ErrorKind::Validation,
            StatusCode::UNAUTHORIZED => ErrorKind::Unauthenticated,
            StatusCode::SERVICE_UNAVAILABLE => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.descriptor.status
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_payload(self) -> (StatusCode, UserFriendlyPayload) {
        let AppError {
            descriptor,
            name,
            error_type,
            message,
            data,
            source: _,
        } = self;

        let status = descriptor.status;
        let (code, reason) = code_and_reason(status);
        let payload = UserFriendlyPayload {
            status: status.as_u16(),
            code,
            reason,
            error_type,
            name,
            message,
            data,
        };

        (status, payload)
    }

    fn from_descriptor(descriptor: &'static ErrorDescriptor, message: Option<String>) -> Self {
        Self {
            descriptor,
            name: descriptor.name.to_owned(),
            error_type: descriptor.error_type.to_owned(),
            message: message.unwrap_or_else(|| descriptor.default_message.to_owned()),
            data: None,
            source: None,
        }
    }

    fn with_source(mut self, error: AnyError) -> Self {
        self.source = Some(error);
        self
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

fn current_request_id() -> Option<String> {
    current_request_context().map(|ctx| ctx.request_id().to_owned())
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = self.into_payload();
        (status, Json(payload)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserFriendlyPayload {
    pub(crate) status: u16,
    pub(crate) code: String,
    pub(crate) reason: String,
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) name: String,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<JsonValue>,
}

fn code_and_reason(status: StatusCode) -> (String, String) {
    let reason = status
        .canonical_reason()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Status {}", status.as_u16()));

    let code = reason
        .chars()
        .map(|ch| match ch {
            'a'..='z' => ch.to_ascii_uppercase(),
            'A'..='Z' | '0'..='9' => ch,
            _ => '_',
        })
        .collect::<String>();

    (code, reason)
}
