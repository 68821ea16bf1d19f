//! Token extraction from incoming requests.
//!
//! An extractor answers one question: did the request carry a token, and if
//! so, what is it? "No token" is `Ok(None)` and lets the middleware decide
//! whether credentials are optional. A token-shaped value that is wrong in
//! form is an error and always rejects the request.

use crate::errors::AuthError;
use axum::http::{header, request::Parts};
use common::secret::SecretString;
use std::sync::Arc;

/// Pulls a raw bearer token out of a request.
pub trait TokenExtractor: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthError::MalformedHeader` when a credential is present but
    /// not in the expected form.
    fn extract(&self, parts: &Parts) -> Result<Option<SecretString>, AuthError>;
}

/// Reads `Authorization: Bearer <token>`.
///
/// The value must be exactly two whitespace-separated fields and the scheme
/// is matched case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerHeaderExtractor;

impl TokenExtractor for BearerHeaderExtractor {
    fn extract(&self, parts: &Parts) -> Result<Option<SecretString>, AuthError> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };

        let value = value.to_str().map_err(|_| {
            tracing::debug!(target: "tg.auth.extractor", "Authorization header is not visible ASCII");
            AuthError::MalformedHeader
        })?;

        if value.is_empty() {
            return Ok(None);
        }

        let mut fields = value.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
                Ok(Some(SecretString::from(token.to_string())))
            }
            _ => {
                tracing::debug!(target: "tg.auth.extractor", "Authorization header is not 'Bearer <token>'");
                Err(AuthError::MalformedHeader)
            }
        }
    }
}

/// Reads a token from a named cookie.
#[derive(Debug, Clone)]
pub struct CookieExtractor {
    name: String,
}

impl CookieExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TokenExtractor for CookieExtractor {
    fn extract(&self, parts: &Parts) -> Result<Option<SecretString>, AuthError> {
        for value in parts.headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };

            let found = value
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(name, _)| *name == self.name)
                .map(|(_, token)| token.trim_matches('"'));

            if let Some(token) = found.filter(|t| !t.is_empty()) {
                return Ok(Some(SecretString::from(token.to_string())));
            }
        }

        Ok(None)
    }
}

/// Tries each extractor in turn and returns the first token found.
///
/// An error from any extractor stops the search.
#[derive(Clone)]
pub struct FirstOf {
    extractors: Vec<Arc<dyn TokenExtractor>>,
}

impl FirstOf {
    pub fn new(extractors: Vec<Arc<dyn TokenExtractor>>) -> Self {
        Self { extractors }
    }
}

impl TokenExtractor for FirstOf {
    fn extract(&self, parts: &Parts) -> Result<Option<SecretString>, AuthError> {
        for extractor in &self.extractors {
            if let Some(token) = extractor.extract(parts)? {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }
}
