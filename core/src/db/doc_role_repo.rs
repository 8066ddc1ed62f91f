use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::doc_roles::DocumentRoleRecord;

#[async_trait]
pub trait DocRoleRepository: Send + Sync {
    async fn list_for_doc(&self, doc_id: &str) -> Result<Vec<DocumentRoleRecord>>;

    async fn find_for_user(&self, doc_id: &str, user_id: &str)
    -> Result<Option<DocumentRoleRecord>>;

    /// Plain insert. An existing grant for the pair surfaces as a unique
    /// violation.
    async fn insert_role(&self, role: &DocumentRoleRecord) -> Result<()>;

    async fn remove_role(&self, doc_id: &str, user_id: &str) -> Result<u64>;
}

pub type DocRoleRepositoryRef = Arc<dyn DocRoleRepository>;
