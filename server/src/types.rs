// Request and response types for REST API handlers

use chrono::{DateTime, Utc};
use docshare_core::{
    doc_roles::{DocRole, DocumentRoleRecord},
    doc_store::DocumentRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

// ========== Request Types ==========

#[derive(Deserialize)]
pub(crate) struct CreateDocumentRequest {
    #[serde(default)]
    pub(crate) title: String,
}

#[derive(Deserialize)]
pub(crate) struct UpdateDocumentRequest {
    #[serde(default)]
    pub(crate) title: String,
}

#[derive(Deserialize)]
pub(crate) struct AddCollaboratorRequest {
    #[serde(default)]
    pub(crate) user_id: String,
    #[serde(default)]
    pub(crate) role: String,
}

#[derive(Deserialize)]
pub(crate) struct RemoveCollaboratorRequest {
    #[serde(default)]
    pub(crate) user_id: String,
}

// ========== Response Types ==========

/// Listing shape; content is only returned by the detail endpoint.
#[derive(Serialize)]
pub(crate) struct DocumentResponse {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) title: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            title: record.title,
            created_at: timestamp(record.created_at),
            updated_at: timestamp(record.updated_at),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct DocumentDetailResponse {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) title: String,
    pub(crate) content: Option<JsonValue>,
    pub(crate) role: DocRole,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl DocumentDetailResponse {
    pub(crate) fn new(record: DocumentRecord, role: DocRole) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            title: record.title,
            content: record.content,
            role,
            created_at: timestamp(record.created_at),
            updated_at: timestamp(record.updated_at),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct CollaboratorResponse {
    pub(crate) user_id: String,
    pub(crate) role: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<DocumentRoleRecord> for CollaboratorResponse {
    fn from(record: DocumentRoleRecord) -> Self {
        Self {
            user_id: record.user_id,
            role: record.role,
            created_at: timestamp(record.created_at),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct MessageResponse {
    pub(crate) message: &'static str,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}
