//! In-memory repositories backing the `memory` database backend.
//!
//! State lives in one map set behind a single `tokio::sync::RwLock`, so every
//! mutation that touches both documents and grants is applied under one write
//! guard and can never be observed half done. Nothing survives a restart.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    db::{
        doc_repo::{DocRepository, InsertDocParams},
        doc_role_repo::DocRoleRepository,
        errors::ConstraintViolation,
    },
    doc_roles::DocumentRoleRecord,
    doc_store::{DocumentAccessRecord, DocumentRecord},
};

const DOCUMENTS_PK: &str = "documents.id";
const ROLES_PK: &str = "doc_user_roles.doc_id, doc_user_roles.user_id";
const ROLES_DOC_FK: &str = "doc_user_roles.doc_id";

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<String, DocumentRecord>,
    /// Keyed by `(doc_id, user_id)`, mirroring the table's primary key.
    roles: BTreeMap<(String, String), DocumentRoleRecord>,
}

impl MemoryState {
    fn roles_for_doc<'a>(&'a self, doc_id: &'a str) -> impl Iterator<Item = &'a DocumentRoleRecord> {
        self.roles
            .values()
            .filter(move |record| record.doc_id == doc_id)
    }
}

/// Shared handle; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_documents(documents: &mut [DocumentRecord]) {
    documents.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl DocRepository for MemoryStore {
    async fn insert_doc_with_owner(&self, params: InsertDocParams) -> Result<()> {
        let InsertDocParams {
            document,
            owner_role,
        } = params;
        let mut state = self.state.write().await;

        if state.documents.contains_key(&document.id) {
            return Err(ConstraintViolation::Unique(DOCUMENTS_PK).into());
        }
        if owner_role.doc_id != document.id {
            return Err(ConstraintViolation::ForeignKey(ROLES_DOC_FK).into());
        }
        let key = (owner_role.doc_id.clone(), owner_role.user_id.clone());
        if state.roles.contains_key(&key) {
            return Err(ConstraintViolation::Unique(ROLES_PK).into());
        }

        state.documents.insert(document.id.clone(), document);
        state.roles.insert(key, owner_role);
        Ok(())
    }

    async fn fetch_doc(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        let state = self.state.read().await;
        Ok(state.documents.get(doc_id).cloned())
    }

    async fn fetch_doc_with_role(
        &self,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentAccessRecord>> {
        let state = self.state.read().await;
        let Some(document) = state.documents.get(doc_id) else {
            return Ok(None);
        };
        let grant_role = state
            .roles
            .get(&(doc_id.to_owned(), user_id.to_owned()))
            .map(|record| record.role.clone());

        Ok(Some(DocumentAccessRecord {
            document: document.clone(),
            grant_role,
        }))
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<DocumentRecord>> {
        let state = self.state.read().await;
        let mut documents: Vec<DocumentRecord> = state
            .documents
            .values()
            .filter(|doc| doc.owner_id == owner_id)
            .cloned()
            .collect();
        sort_documents(&mut documents);
        Ok(documents)
    }

    async fn list_granted(&self, user_id: &str) -> Result<Vec<DocumentRecord>> {
        let state = self.state.read().await;
        let mut documents: Vec<DocumentRecord> = state
            .roles
            .values()
            .filter(|record| record.user_id == user_id)
            .filter_map(|record| state.documents.get(&record.doc_id))
            .cloned()
            .collect();
        sort_documents(&mut documents);
        Ok(documents)
    }

    async fn update_title(&self, doc_id: &str, title: &str, updated_at: i64) -> Result<u64> {
        let mut state = self.state.write().await;
        match state.documents.get_mut(doc_id) {
            Some(document) => {
                document.title = title.to_owned();
                document.updated_at = updated_at;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_doc(&self, doc_id: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        if state.documents.remove(doc_id).is_none() {
            return Ok(0);
        }
        state.roles.retain(|(role_doc, _), _| role_doc != doc_id);
        Ok(1)
    }
}

#[async_trait]
impl DocRoleRepository for MemoryStore {
    async fn list_for_doc(&self, doc_id: &str) -> Result<Vec<DocumentRoleRecord>> {
        let state = self.state.read().await;
        let mut roles: Vec<DocumentRoleRecord> = state.roles_for_doc(doc_id).cloned().collect();
        roles.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(roles)
    }

    async fn find_for_user(
        &self,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentRoleRecord>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .get(&(doc_id.to_owned(), user_id.to_owned()))
            .cloned())
    }

    async fn insert_role(&self, role: &DocumentRoleRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.documents.contains_key(&role.doc_id) {
            return Err(ConstraintViolation::ForeignKey(ROLES_DOC_FK).into());
        }
        let key = (role.doc_id.clone(), role.user_id.clone());
        if state.roles.contains_key(&key) {
            return Err(ConstraintViolation::Unique(ROLES_PK).into());
        }
        state.roles.insert(key, role.clone());
        Ok(())
    }

    async fn remove_role(&self, doc_id: &str, user_id: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        let removed = state
            .roles
            .remove(&(doc_id.to_owned(), user_id.to_owned()))
            .is_some();
        Ok(u64::from(removed))
    }
}
