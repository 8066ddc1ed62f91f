// Caller identity. The user id arrives as a trusted opaque header set by the
// fronting gateway; nothing here verifies it further.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use docshare_core::ids::UserId;

use crate::{error::AppError, handlers::headers::HEADER_USER_ID, observability};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &UserId {
        &self.user_id
    }
}

pub(crate) fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, AppError> {
    let user_id = headers
        .get(HEADER_USER_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::unauthorized("missing or invalid user ID header"))?;

    Ok(UserId::from(user_id))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = user_id_from_headers(&parts.headers)?;
        observability::record_authenticated_identity(Some(user_id.as_str()));
        Ok(Self { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::http::HeaderValue;

    #[test]
    fn reads_trimmed_user_id() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_USER_ID, HeaderValue::from_static("  alice "));
        assert_eq!(user_id_from_headers(&headers).unwrap().as_str(), "alice");
    }

    #[test]
    fn missing_or_blank_header_is_unauthenticated() {
        let headers = HeaderMap::new();
        let err = user_id_from_headers(&headers).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_USER_ID, HeaderValue::from_static("   "));
        let err = user_id_from_headers(&headers).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }
}
