use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{RepositoryRegistry, doc_role_repo::DocRoleRepositoryRef};

/// Access level on a single document. Declaration order is the permission
/// order, so `Ord` answers "at least as permissive as".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocRole {
    Viewer,
    Editor,
    Owner,
}

impl DocRole {
    pub fn as_str(self) -> &'static str {
        match self {
            DocRole::Viewer => "viewer",
            DocRole::Editor => "editor",
            DocRole::Owner => "owner",
        }
    }

    /// Roles a document owner may hand out to collaborators.
    pub fn is_assignable(self) -> bool {
        !matches!(self, DocRole::Owner)
    }

    /// Whether an effective role (absent meaning no access) meets `required`.
    pub fn satisfies(resolved: Option<DocRole>, required: DocRole) -> bool {
        resolved.is_some_and(|role| role >= required)
    }
}

impl fmt::Display for DocRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocRole {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(DocRole::Viewer),
            "editor" => Ok(DocRole::Editor),
            "owner" => Ok(DocRole::Owner),
            other => Err(anyhow!("unknown document role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRoleRecord {
    pub doc_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: i64,
}

impl DocumentRoleRecord {
    pub fn doc_role(&self) -> Result<DocRole> {
        self.role.parse()
    }
}

#[derive(Clone)]
pub struct DocumentRoleStore {
    repo: DocRoleRepositoryRef,
}

impl DocumentRoleStore {
    pub fn new(registry: &RepositoryRegistry) -> Self {
        Self {
            repo: registry.doc_role_repo(),
        }
    }

    pub async fn list_for_doc(&self, doc_id: &str) -> Result<Vec<DocumentRoleRecord>> {
        self.repo.list_for_doc(doc_id).await
    }

    pub async fn find_for_user(
        &self,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentRoleRecord>> {
        self.repo.find_for_user(doc_id, user_id).await
    }

    /// Inserts a new grant. Fails with a unique violation when the pair
    /// already holds a grant; grants are never replaced in place.
    pub async fn insert(
        &self,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
    ) -> Result<DocumentRoleRecord> {
        let record = DocumentRoleRecord {
            doc_id: doc_id.to_owned(),
            user_id: user_id.to_owned(),
            role: role.as_str().to_owned(),
            created_at: Utc::now().timestamp_millis(),
        };
        self.repo.insert_role(&record).await?;
        Ok(record)
    }

    pub async fn remove(&self, doc_id: &str, user_id: &str) -> Result<bool> {
        let removed = self.repo.remove_role(doc_id, user_id).await?;
        Ok(removed > 0)
    }
}
