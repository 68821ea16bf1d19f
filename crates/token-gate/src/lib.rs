//! Token Gate Library
//!
//! Bearer token verification for HTTP services. A request's token is
//! checked against the claims policy and a signing key published by a
//! remote authority before the protected handler runs:
//!
//! ```text
//! request -> middleware::auth -> auth::extractor -> auth::verifier
//!                                                     |-> auth::claims
//!                                                     |-> auth::jwks
//! ```
//!
//! # Modules
//!
//! - `auth` - Token extraction, key resolution, claims validation, verification
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication, error rendering and HTTP metrics middleware
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
