use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::doc_repo::{DocRepository, InsertDocParams},
    doc_store::{DocumentAccessRecord, DocumentRecord},
};

pub struct SqliteDocRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDocRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<DocumentRecord> {
        let content = row
            .try_get::<Option<String>, _>("content")?
            .map(|raw| serde_json::from_str::<JsonValue>(&raw))
            .transpose()
            .context("document content is not valid JSON")?;

        Ok(DocumentRecord {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            title: row.try_get("title")?,
            content,
            created_at: row.try_get::<i64, _>("created_at")?,
            updated_at: row.try_get::<i64, _>("updated_at")?,
        })
    }

    fn map_rows(rows: Vec<SqliteRow>) -> Result<Vec<DocumentRecord>> {
        rows.iter().map(Self::map_row).collect()
    }
}

#[async_trait]
impl DocRepository for SqliteDocRepository {
    async fn insert_doc_with_owner(&self, params: InsertDocParams) -> Result<()> {
        let InsertDocParams {
            document,
            owner_role,
        } = params;
        let content = document
            .content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO documents (id, owner_id, title, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(&document.owner_id)
        .bind(&document.title)
        .bind(content)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut *tx)
        .await
        .context("failed to insert document")?;

        sqlx::query(
            "INSERT INTO doc_user_roles (doc_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&owner_role.doc_id)
        .bind(&owner_role.user_id)
        .bind(&owner_role.role)
        .bind(owner_role.created_at)
        .execute(&mut *tx)
        .await
        .context("failed to insert owner grant")?;

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_doc(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, content, created_at, updated_at
             FROM documents
             WHERE id = ?",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn fetch_doc_with_role(
        &self,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentAccessRecord>> {
        let row = sqlx::query(
            "SELECT
                 d.id, d.owner_id, d.title, d.content, d.created_at, d.updated_at,
                 r.role AS grant_role
             FROM documents d
             LEFT JOIN doc_user_roles r
               ON r.doc_id = d.id AND r.user_id = ?
             WHERE d.id = ?",
        )
        .bind(user_id)
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(DocumentAccessRecord {
            document: Self::map_row(&row)?,
            grant_role: row.try_get::<Option<String>, _>("grant_role")?,
        }))
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, title, content, created_at, updated_at
             FROM documents
             WHERE owner_id = ?
             ORDER BY updated_at DESC, id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Self::map_rows(rows)
    }

    async fn list_granted(&self, user_id: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT d.id, d.owner_id, d.title, d.content, d.created_at, d.updated_at
             FROM documents d
             INNER JOIN doc_user_roles r ON r.doc_id = d.id
             WHERE r.user_id = ?
             ORDER BY d.updated_at DESC, d.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Self::map_rows(rows)
    }

    async fn update_title(&self, doc_id: &str, title: &str, updated_at: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE documents SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(updated_at)
            .bind(doc_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_doc(&self, doc_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM doc_user_roles WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
