use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    doc_roles::DocumentRoleRecord,
    doc_store::{DocumentAccessRecord, DocumentRecord},
};

#[derive(Debug, Clone)]
pub struct InsertDocParams {
    pub document: DocumentRecord,
    pub owner_role: DocumentRoleRecord,
}

#[async_trait]
pub trait DocRepository: Send + Sync {
    /// Writes the document row and its owner grant atomically.
    async fn insert_doc_with_owner(&self, params: InsertDocParams) -> Result<()>;

    async fn fetch_doc(&self, doc_id: &str) -> Result<Option<DocumentRecord>>;

    /// Document plus the grant held by `user_id`, if any, in a single lookup.
    async fn fetch_doc_with_role(
        &self,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentAccessRecord>>;

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<DocumentRecord>>;

    async fn list_granted(&self, user_id: &str) -> Result<Vec<DocumentRecord>>;

    async fn update_title(&self, doc_id: &str, title: &str, updated_at: i64) -> Result<u64>;

    /// Deletes the document together with every grant on it.
    async fn delete_doc(&self, doc_id: &str) -> Result<u64>;
}

pub type DocRepositoryRef = Arc<dyn DocRepository>;
