use docshare_core::{config::AppConfig, db::Database};
use tempfile::TempDir;

use crate::state::{AppState, build_state};

pub(crate) fn setup_memory_state() -> AppState {
    build_state(&Database::in_memory())
}

pub(crate) async fn setup_state() -> (TempDir, Database, AppState) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let config = AppConfig {
        database_path: temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .into_owned(),
        ..AppConfig::default()
    };

    let database = Database::connect(&config).await.expect("connect database");
    let state = build_state(&database);

    (temp_dir, database, state)
}
