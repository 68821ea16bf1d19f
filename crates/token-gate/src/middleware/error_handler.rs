//! Rendering of authentication failures.
//!
//! The auth middleware hands every rejection to an [`AuthErrorHandler`].
//! Swapping the handler changes the client-visible response without
//! touching verification.

use crate::errors::AuthError;
use axum::{
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Produces the response for a rejected request.
pub trait AuthErrorHandler: Send + Sync {
    fn on_error(&self, parts: &Parts, error: &AuthError) -> Response;
}

/// 401 with the error message as a plain-text body.
///
/// Every failure, including an unreachable key set, is reported as 401.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnauthorizedHandler;

impl AuthErrorHandler for UnauthorizedHandler {
    fn on_error(&self, _parts: &Parts, error: &AuthError) -> Response {
        let mut response = (StatusCode::UNAUTHORIZED, error.to_string()).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(error.www_authenticate()),
        );
        response
    }
}

/// JSON envelope `{"error":{"code","message"}}` with the error's own status
/// (503 for an unavailable key set, 401 otherwise).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorHandler;

impl AuthErrorHandler for JsonErrorHandler {
    fn on_error(&self, _parts: &Parts, error: &AuthError) -> Response {
        error.clone().into_response()
    }
}
