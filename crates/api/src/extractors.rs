//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use condo_common::AppError;
use uuid::Uuid;

/// Authenticated user extractor.
///
/// Holds the user id taken from the verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}
