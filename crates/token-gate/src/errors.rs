//! Token Gate error types.
//!
//! Every verification failure is request-scoped: it rejects the one request
//! that carried the token and nothing else. There is no variant that means
//! "stop the process".
//!
//! Messages are descriptive but never include the raw token, claim values,
//! or key material.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reason a request failed authentication.
///
/// Variants are listed roughly in the order the pipeline can produce them:
/// extraction, parsing, claims, key resolution, algorithm, signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header format must be Bearer {{token}}")]
    MalformedHeader,

    #[error("Required authorization token not found")]
    MissingCredentials,

    #[error("Token is malformed")]
    ParseError,

    #[error("Token is expired")]
    TokenExpired,

    #[error("Token issued-at is missing or in the future")]
    InvalidIssuedAt,

    #[error("Token is not valid yet")]
    TokenNotYetValid,

    #[error("Token has an invalid issuer")]
    InvalidIssuer,

    #[error("Token has an invalid audience")]
    InvalidAudience,

    #[error("Signing key set is unavailable")]
    KeySetUnavailable,

    #[error("Unable to find appropriate key")]
    KeyNotFound,

    #[error("Expected {expected} signing method but token specified {actual}")]
    AlgorithmMismatch { expected: String, actual: String },

    #[error("Token signature is invalid")]
    InvalidSignature,
}

impl AuthError {
    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedHeader => "MALFORMED_HEADER",
            AuthError::MissingCredentials => "MISSING_CREDENTIALS",
            AuthError::ParseError => "PARSE_ERROR",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidIssuedAt => "INVALID_ISSUED_AT",
            AuthError::TokenNotYetValid => "TOKEN_NOT_YET_VALID",
            AuthError::InvalidIssuer => "INVALID_ISSUER",
            AuthError::InvalidAudience => "INVALID_AUDIENCE",
            AuthError::KeySetUnavailable => "KEY_SET_UNAVAILABLE",
            AuthError::KeyNotFound => "KEY_NOT_FOUND",
            AuthError::AlgorithmMismatch { .. } => "ALGORITHM_MISMATCH",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
        }
    }

    /// Bounded label value for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthError::MalformedHeader => "malformed_header",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::ParseError => "parse_error",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuedAt => "invalid_issued_at",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::KeySetUnavailable => "key_set_unavailable",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::AlgorithmMismatch { .. } => "algorithm_mismatch",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }

    /// HTTP status code for this error.
    ///
    /// Everything is 401 except an unreachable key set, which is our
    /// problem rather than the client's.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::KeySetUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// `WWW-Authenticate` challenge for a 401.
    ///
    /// A request that presented no token gets a bare challenge with no
    /// error code (RFC 6750 section 3.1).
    pub fn www_authenticate(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => BEARER_CHALLENGE,
            _ => INVALID_TOKEN_CHALLENGE,
        }
    }
}

const BEARER_CHALLENGE: &str = "Bearer realm=\"token-gate\"";
const INVALID_TOKEN_CHALLENGE: &str = "Bearer realm=\"token-gate\", error=\"invalid_token\"";

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// JSON error envelope: `{"error":{"code":"...","message":"..."}}`.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(target: "tg.availability", code = self.code(), "Key set unavailable");
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(self.www_authenticate()),
            );
        }

        response
    }
}
