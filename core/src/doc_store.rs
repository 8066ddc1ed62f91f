use anyhow::{Result, anyhow};
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    db::{
        RepositoryRegistry,
        doc_repo::{DocRepositoryRef, InsertDocParams},
    },
    doc_roles::{DocRole, DocumentRoleRecord},
};

/// Longest title accepted, counted in characters after trimming.
pub const MAX_TITLE_CHARS: usize = 255;

/// Trims `title` and rejects it when empty or longer than [`MAX_TITLE_CHARS`].
pub fn normalize_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(anyhow!("document title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(anyhow!(
            "document title must be at most {MAX_TITLE_CHARS} characters"
        ));
    }
    Ok(title)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content: Option<JsonValue>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A document joined with the grant row of one particular user.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAccessRecord {
    pub document: DocumentRecord,
    pub grant_role: Option<String>,
}

impl DocumentAccessRecord {
    /// Effective role for the user this record was fetched for. Ownership
    /// wins over whatever the grant table says.
    pub fn effective_role(&self, user_id: &str) -> Result<Option<DocRole>> {
        if self.document.owner_id == user_id {
            return Ok(Some(DocRole::Owner));
        }

        self.grant_role
            .as_deref()
            .map(str::parse::<DocRole>)
            .transpose()
    }
}

#[derive(Clone)]
pub struct DocumentStore {
    repo: DocRepositoryRef,
}

impl DocumentStore {
    pub fn new(registry: &RepositoryRegistry) -> Self {
        Self {
            repo: registry.doc_repo(),
        }
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Creates a document and its owner grant as one unit.
    pub async fn create(&self, owner_id: &str, title: &str) -> Result<DocumentRecord> {
        let title = normalize_title(title)?;

        let now = Self::now_millis();
        let document = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_owned(),
            title: title.to_owned(),
            content: None,
            created_at: now,
            updated_at: now,
        };
        let owner_role = DocumentRoleRecord {
            doc_id: document.id.clone(),
            user_id: owner_id.to_owned(),
            role: DocRole::Owner.as_str().to_owned(),
            created_at: now,
        };

        self.repo
            .insert_doc_with_owner(InsertDocParams {
                document: document.clone(),
                owner_role,
            })
            .await?;

        Ok(document)
    }

    pub async fn find_with_role(
        &self,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentAccessRecord>> {
        self.repo.fetch_doc_with_role(doc_id, user_id).await
    }

    pub async fn list_owned(&self, owner_id: &str) -> Result<Vec<DocumentRecord>> {
        self.repo.list_owned(owner_id).await
    }

    pub async fn list_granted(&self, user_id: &str) -> Result<Vec<DocumentRecord>> {
        self.repo.list_granted(user_id).await
    }

    /// Returns the updated document, or `None` when it no longer exists.
    pub async fn update_title(&self, doc_id: &str, title: &str) -> Result<Option<DocumentRecord>> {
        let title = normalize_title(title)?;

        let updated = self
            .repo
            .update_title(doc_id, title, Self::now_millis())
            .await?;
        if updated == 0 {
            return Ok(None);
        }

        self.repo.fetch_doc(doc_id).await
    }

    pub async fn delete(&self, doc_id: &str) -> Result<bool> {
        let deleted = self.repo.delete_doc(doc_id).await?;
        Ok(deleted > 0)
    }
}
