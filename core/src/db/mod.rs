use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::info;

use self::{
    doc_repo::DocRepositoryRef,
    doc_role_repo::DocRoleRepositoryRef,
    memory::MemoryStore,
    sqlite::{doc_repo::SqliteDocRepository, doc_role_repo::SqliteDocRoleRepository},
};
use crate::config::{AppConfig, DatabaseBackend};

pub mod doc_repo;
pub mod doc_role_repo;
pub mod errors;
pub mod memory;
pub mod sqlite;

#[derive(Clone)]
pub struct RepositoryRegistry {
    doc_repo: DocRepositoryRef,
    doc_role_repo: DocRoleRepositoryRef,
}

impl RepositoryRegistry {
    pub fn new(doc_repo: DocRepositoryRef, doc_role_repo: DocRoleRepositoryRef) -> Self {
        Self {
            doc_repo,
            doc_role_repo,
        }
    }

    pub fn doc_repo(&self) -> DocRepositoryRef {
        self.doc_repo.clone()
    }

    pub fn doc_role_repo(&self) -> DocRoleRepositoryRef {
        self.doc_role_repo.clone()
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Option<SqlitePool>,
    repositories: Arc<RepositoryRegistry>,
    backend: DatabaseBackend,
}

impl Database {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        match config.database_backend {
            DatabaseBackend::Sqlite => Self::connect_sqlite(config).await,
            DatabaseBackend::Memory => Ok(Self::in_memory()),
        }
    }

    async fn connect_sqlite(config: &AppConfig) -> Result<Self> {
        let db_file = Self::resolve_db_path(&config.database_path)?;
        if let Some(parent) = db_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory: {}", parent.display())
            })?;
        }

        let pool = Self::open_sqlite_pool(&db_file, config.database_max_connections).await?;
        sqlx::migrate!("../server/migrations/sqlite")
            .run(&pool)
            .await
            .context("failed to run sqlite migrations")?;
        info!(path = %db_file.display(), "sqlite database ready");

        let doc_repo = Arc::new(SqliteDocRepository::new(pool.clone())) as DocRepositoryRef;
        let doc_role_repo =
            Arc::new(SqliteDocRoleRepository::new(pool.clone())) as DocRoleRepositoryRef;

        Ok(Self {
            pool: Some(pool),
            repositories: Arc::new(RepositoryRegistry::new(doc_repo, doc_role_repo)),
            backend: DatabaseBackend::Sqlite,
        })
    }

    /// Non-durable database whose repositories share one in-process store.
    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        let doc_repo = Arc::new(store.clone()) as DocRepositoryRef;
        let doc_role_repo = Arc::new(store) as DocRoleRepositoryRef;

        Self {
            pool: None,
            repositories: Arc::new(RepositoryRegistry::new(doc_repo, doc_role_repo)),
            backend: DatabaseBackend::Memory,
        }
    }

    pub fn pool(&self) -> Option<&SqlitePool> {
        self.pool.as_ref()
    }

    pub fn repositories(&self) -> Arc<RepositoryRegistry> {
        self.repositories.clone()
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    /// Foreign keys must be on for every connection: grant rows rely on the
    /// cascade from `documents` and on FK rejection for vanished documents.
    async fn open_sqlite_pool(path: &Path, max_connections: u32) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open sqlite database: {}", path.display()))
    }

    fn resolve_db_path(path: &str) -> Result<PathBuf> {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            Ok(path)
        } else {
            let cwd = std::env::current_dir().context("failed to obtain current directory")?;
            Ok(cwd.join(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        doc_roles::{DocRole, DocumentRoleStore},
        doc_store::DocumentStore,
        db::errors::is_unique_violation,
    };
    use tempfile::TempDir;

    async fn sqlite_database() -> (TempDir, Database) {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig {
            database_path: dir
                .path()
                .join("docshare.db")
                .to_string_lossy()
                .into_owned(),
            ..AppConfig::default()
        };
        let database = Database::connect(&config).await.expect("connect sqlite");
        (dir, database)
    }

    #[tokio::test]
    async fn sqlite_pool_enforces_foreign_keys_and_wal() {
        let (_dir, database) = sqlite_database().await;
        let pool = database.pool().expect("sqlite pool");

        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let orphan = sqlx::query(
            "INSERT INTO doc_user_roles (doc_id, user_id, role, created_at)
             VALUES ('missing', 'bob', 'viewer', 0)",
        )
        .execute(pool)
        .await
        .map_err(anyhow::Error::from)
        .expect_err("orphan grant must be rejected");
        assert!(errors::is_foreign_key_violation(&orphan));
    }

    #[tokio::test]
    async fn sqlite_create_materializes_owner_grant() {
        let (_dir, database) = sqlite_database().await;
        let registry = database.repositories();
        let docs = DocumentStore::new(&registry);
        let roles = DocumentRoleStore::new(&registry);

        let doc = docs.create("alice", "  Plan ").await.expect("create");
        assert_eq!(doc.title, "Plan");

        let grants = roles.list_for_doc(&doc.id).await.expect("list grants");
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].user_id, "alice");
        assert_eq!(grants[0].doc_role().unwrap(), DocRole::Owner);
    }

    #[tokio::test]
    async fn sqlite_create_rolls_back_when_owner_grant_fails() {
        let (_dir, database) = sqlite_database().await;
        let pool = database.pool().expect("sqlite pool");
        sqlx::query(
            "CREATE TRIGGER reject_mallory_grant
             BEFORE INSERT ON doc_user_roles
             WHEN NEW.user_id = 'mallory'
             BEGIN
                 SELECT RAISE(ABORT, 'grant rejected');
             END",
        )
        .execute(pool)
        .await
        .expect("install trigger");

        let registry = database.repositories();
        let docs = DocumentStore::new(&registry);
        assert!(docs.create("mallory", "Doomed").await.is_err());
        assert!(docs.list_owned("mallory").await.unwrap().is_empty());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn sqlite_resolves_role_with_single_join() {
        let (_dir, database) = sqlite_database().await;
        let registry = database.repositories();
        let docs = DocumentStore::new(&registry);
        let roles = DocumentRoleStore::new(&registry);

        let doc = docs.create("alice", "Notes").await.unwrap();
        roles.insert(&doc.id, "bob", DocRole::Viewer).await.unwrap();

        let bob = docs.find_with_role(&doc.id, "bob").await.unwrap().unwrap();
        assert_eq!(bob.grant_role.as_deref(), Some("viewer"));
        assert_eq!(bob.effective_role("bob").unwrap(), Some(DocRole::Viewer));

        let carol = docs.find_with_role(&doc.id, "carol").await.unwrap().unwrap();
        assert_eq!(carol.effective_role("carol").unwrap(), None);

        assert!(docs.find_with_role("missing", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_duplicate_grant_is_unique_violation() {
        let (_dir, database) = sqlite_database().await;
        let registry = database.repositories();
        let docs = DocumentStore::new(&registry);
        let roles = DocumentRoleStore::new(&registry);

        let doc = docs.create("alice", "Notes").await.unwrap();
        roles.insert(&doc.id, "bob", DocRole::Editor).await.unwrap();
        let err = roles
            .insert(&doc.id, "bob", DocRole::Viewer)
            .await
            .expect_err("duplicate grant");
        assert!(is_unique_violation(&err));

        let owner_dup = roles
            .insert(&doc.id, "alice", DocRole::Viewer)
            .await
            .expect_err("owner already holds a grant");
        assert!(is_unique_violation(&owner_dup));
    }

    #[tokio::test]
    async fn sqlite_delete_cascades_and_lists_union() {
        let (_dir, database) = sqlite_database().await;
        let registry = database.repositories();
        let docs = DocumentStore::new(&registry);
        let roles = DocumentRoleStore::new(&registry);

        let shared = docs.create("alice", "Shared").await.unwrap();
        roles.insert(&shared.id, "bob", DocRole::Viewer).await.unwrap();
        docs.create("bob", "Own").await.unwrap();

        let granted = docs.list_granted("bob").await.unwrap();
        // bob's own document carries his owner grant too
        assert_eq!(granted.len(), 2);

        assert!(docs.delete(&shared.id).await.unwrap());
        assert!(roles.list_for_doc(&shared.id).await.unwrap().is_empty());
        assert_eq!(docs.list_granted("bob").await.unwrap().len(), 1);
        assert!(!docs.delete(&shared.id).await.unwrap());
    }

    #[tokio::test]
    async fn memory_backend_shares_state_between_repositories() {
        let database = Database::in_memory();
        assert_eq!(database.backend(), DatabaseBackend::Memory);
        assert!(database.pool().is_none());

        let registry = database.repositories();
        let docs = DocumentStore::new(&registry);
        let roles = DocumentRoleStore::new(&registry);

        let doc = docs.create("alice", "Memo").await.unwrap();
        let owner = roles.find_for_user(&doc.id, "alice").await.unwrap();
        assert_eq!(owner.map(|r| r.role), Some("owner".to_owned()));
    }
}
