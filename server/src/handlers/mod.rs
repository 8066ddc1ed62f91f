// HTTP handlers module structure

pub(crate) mod collaborator_handlers;
pub(crate) mod doc_handlers;
pub(crate) mod headers;
pub(crate) mod health_handlers;
