//! HTTP API layer for condo-voting.
//!
//! - **Endpoints**: public voting API and the internal Telegram bridge API
//! - **Extractors**: bearer-token authenticated user
//! - **Middleware**: token verification
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{health, router};
pub use middleware::{AppState, Claims, JwtVerifier, auth_middleware};
