pub mod auth;
pub mod doc;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod request_cache;
pub mod router;
pub mod state;
pub mod types;

pub use error::AppError;
pub use state::{AppState, build_state};

#[cfg(test)]
pub(crate) mod testing;
