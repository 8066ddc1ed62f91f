pub mod context;
pub mod documents;
pub mod gate;
pub mod roles;
pub mod service;
