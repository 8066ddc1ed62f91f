pub mod config;
pub mod db;
pub mod doc_roles;
pub mod doc_store;
pub mod ids;
