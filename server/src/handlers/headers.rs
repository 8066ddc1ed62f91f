use docshare_core::doc_roles::DocRole;

pub(crate) const HEADER_USER_ID: &str = "x-user-id";
pub(crate) const HEADER_DOC_ID: &str = "x-docshare-doc-id";
pub(crate) const HEADER_DOC_ROLE: &str = "x-docshare-doc-role";

pub(crate) fn doc_role_header_value(role: DocRole) -> &'static str {
    match role {
        DocRole::Owner => "OWNER",
        DocRole::Editor => "EDITOR",
        DocRole::Viewer => "VIEWER",
    }
}
