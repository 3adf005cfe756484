//! API middleware.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use condo_common::{AppError, AppResult};
use condo_core::VotingService;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extractors::AuthUser;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub voting_service: VotingService,
    pub jwt: JwtVerifier,
}

/// Bearer token claims issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// HS256 bearer token verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a token and return the user it was issued to.
    pub fn verify(&self, token: &str) -> AppResult<Uuid> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::Unauthorized
            })
    }
}

/// Authentication middleware.
///
/// Never rejects on its own; endpoints that need a user take [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(user_id) = state.jwt.verify(token)
    {
        req.extensions_mut().insert(AuthUser(user_id));
    }

    next.run(req).await
}
