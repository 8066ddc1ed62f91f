pub mod doc_repo;
pub mod doc_role_repo;
