//! HTTP middleware for Token Gate.
//!
//! - `auth` - Bearer token verification for protected routes
//! - `error_handler` - Pluggable rendering of authentication failures
//! - `http_metrics` - Request metrics for every response

pub mod auth;
pub mod error_handler;
pub mod http_metrics;

pub use auth::{require_auth, AuthOptions, AuthState, Identity, IdentityExt};
pub use error_handler::{AuthErrorHandler, JsonErrorHandler, UnauthorizedHandler};
pub use http_metrics::http_metrics_middleware;
