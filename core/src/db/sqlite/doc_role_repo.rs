use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{db::doc_role_repo::DocRoleRepository, doc_roles::DocumentRoleRecord};

pub struct SqliteDocRoleRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDocRoleRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> DocumentRoleRecord {
        DocumentRoleRecord {
            doc_id: row.get("doc_id"),
            user_id: row.get("user_id"),
            role: row.get("role"),
            created_at: row.get::<i64, _>("created_at"),
        }
    }
}

#[async_trait]
impl DocRoleRepository for SqliteDocRoleRepository {
    async fn list_for_doc(&self, doc_id: &str) -> Result<Vec<DocumentRoleRecord>> {
        let rows = sqlx::query(
            "SELECT doc_id, user_id, role, created_at
             FROM doc_user_roles
             WHERE doc_id = ?
             ORDER BY created_at ASC, user_id ASC",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    async fn find_for_user(
        &self,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentRoleRecord>> {
        let row = sqlx::query(
            "SELECT doc_id, user_id, role, created_at
             FROM doc_user_roles
             WHERE doc_id = ? AND user_id = ?",
        )
        .bind(doc_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_row))
    }

    async fn insert_role(&self, role: &DocumentRoleRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO doc_user_roles (doc_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&role.doc_id)
        .bind(&role.user_id)
        .bind(&role.role)
        .bind(role.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_role(&self, doc_id: &str, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM doc_user_roles WHERE doc_id = ? AND user_id = ?")
            .bind(doc_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
