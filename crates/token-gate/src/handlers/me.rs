//! Current identity handler.
//!
//! Echoes the verified token's registered claims. This is the demo protected
//! route; it carries no business payload.

use crate::auth::{Audience, NumericDate};
use crate::middleware::Identity;
use axum::Json;
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<NumericDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<NumericDate>,

    /// Key that signed the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Handler for GET /api/v1/me
///
/// Taking `Identity` means an unauthenticated request (possible when
/// credentials are optional) is answered with `MissingCredentials`.
///
/// ```json
/// {
///   "sub": "user-123",
///   "iss": "https://auth.example.com/t/shark-academy",
///   "aud": "http://localhost:8081",
///   "exp": 1700003600,
///   "iat": 1700000000,
///   "kid": "key-2024-01"
/// }
/// ```
#[instrument(skip_all, name = "tg.handlers.me")]
pub async fn get_me(identity: Identity) -> Json<MeResponse> {
    tracing::debug!(target: "tg.handlers.me", "Returning verified identity");

    let token = identity.token();

    Json(MeResponse {
        sub: token.claims.sub.clone(),
        iss: token.claims.iss.clone(),
        aud: token.claims.aud.clone(),
        exp: token.claims.exp.clone(),
        iat: token.claims.iat.clone(),
        kid: token.header.kid.clone(),
    })
}
