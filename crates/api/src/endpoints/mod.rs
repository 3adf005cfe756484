//! API endpoints.

mod health;
mod internal;
mod votings;

use axum::Router;

use crate::middleware::AppState;

pub use health::health;

/// Create the API router.
///
/// Paths are relative to `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(votings::router())
        .merge(internal::router())
}
