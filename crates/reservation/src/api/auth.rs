//! Caller identity extraction
//!
//! Tokens are verified by the gateway in front of this service, which forwards
//! the verified principal in headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use crate::api::models::{api_error, ApiError};
use crate::identity::Identity;

/// Header carrying the verified subject
pub const SUBJECT_HEADER: &str = "x-authenticated-subject";

/// Header carrying comma-separated roles of the subject
pub const ROLES_HEADER: &str = "x-authenticated-roles";

/// Extractor for routes that require an authenticated caller.
///
/// Rejects with 401 when the subject header is missing or blank.
#[derive(Debug, Clone)]
pub struct RequireIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let subject = parts
            .headers
            .get(SUBJECT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                api_error(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHENTICATED",
                    "Authentication required",
                    None,
                )
            })?;

        let roles: Vec<String> = parts
            .headers
            .get(ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(RequireIdentity(Identity::new(subject).with_roles(roles)))
    }
}
