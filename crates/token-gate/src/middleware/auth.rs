//! Authentication middleware for protected routes.
//!
//! `require_auth` extracts the token with the configured [`TokenExtractor`],
//! runs the [`Verifier`], and on success stores an [`Identity`] in the
//! request extensions before calling the protected handler. Any failure is
//! rendered by the configured [`AuthErrorHandler`] and the handler is never
//! called.

use crate::auth::{
    BearerHeaderExtractor, Claims, ClaimsValidator, JwksClient, TokenExtractor, VerifiedToken,
    Verifier,
};
use crate::config::{Config, ErrorFormat, DEFAULT_USER_PROPERTY};
use crate::errors::AuthError;
use crate::middleware::error_handler::{AuthErrorHandler, JsonErrorHandler, UnauthorizedHandler};
use crate::observability::metrics;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, Method},
    middleware::Next,
    response::Response,
};
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// Middleware behavior switches.
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Let requests without a token through unauthenticated.
    pub credentials_optional: bool,

    /// Verify `OPTIONS` requests instead of passing them through.
    pub enable_auth_on_options: bool,

    /// Name the verified token is attached under.
    pub user_property: Arc<str>,

    /// Also log rejection reasons at info level.
    pub debug: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            credentials_optional: false,
            enable_auth_on_options: false,
            user_property: Arc::from(DEFAULT_USER_PROPERTY),
            debug: false,
        }
    }
}

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<Verifier>,
    pub extractor: Arc<dyn TokenExtractor>,
    pub error_handler: Arc<dyn AuthErrorHandler>,
    pub options: AuthOptions,
}

impl AuthState {
    /// Bearer-header extraction, plain 401 responses, default options.
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self {
            verifier,
            extractor: Arc::new(BearerHeaderExtractor),
            error_handler: Arc::new(UnauthorizedHandler),
            options: AuthOptions::default(),
        }
    }

    /// Wire a JWKS-backed verifier and middleware options from configuration.
    pub fn from_config(config: &Config) -> Self {
        let jwks_client = Arc::new(JwksClient::with_options(
            config.jwks_url(),
            config.jwks_fetch_timeout(),
            config.jwks_cache_ttl(),
        ));
        let claims_validator = ClaimsValidator::new(
            config.issuer(),
            config.audience.clone(),
            config.jwt_clock_skew_seconds,
        );
        let verifier = Arc::new(Verifier::new(
            jwks_client,
            claims_validator,
            config.jwt_algorithm,
        ));

        let error_handler: Arc<dyn AuthErrorHandler> = match config.error_format {
            ErrorFormat::Text => Arc::new(UnauthorizedHandler),
            ErrorFormat::Json => Arc::new(JsonErrorHandler),
        };

        Self::new(verifier)
            .with_error_handler(error_handler)
            .with_options(AuthOptions {
                credentials_optional: config.credentials_optional,
                enable_auth_on_options: config.enable_auth_on_options,
                user_property: Arc::from(config.user_property.as_str()),
                debug: config.debug,
            })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TokenExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_error_handler(mut self, error_handler: Arc<dyn AuthErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    pub fn with_options(mut self, options: AuthOptions) -> Self {
        self.options = options;
        self
    }

    fn reject(&self, parts: &Parts, error: &AuthError) -> Response {
        metrics::record_token_validation("error", Some(error.error_type()));

        if self.options.debug {
            tracing::info!(
                target: "tg.middleware.auth",
                method = %parts.method,
                path = %parts.uri.path(),
                reason = %error,
                "Request rejected"
            );
        } else {
            tracing::debug!(
                target: "tg.middleware.auth",
                method = %parts.method,
                path = %parts.uri.path(),
                reason = %error,
                "Request rejected"
            );
        }

        self.error_handler.on_error(parts, error)
    }
}

/// Authentication middleware.
///
/// # Response
///
/// - Error handler response if the token is malformed, missing (and
///   required) or fails verification
/// - Otherwise the protected handler's response, with [`Identity`] available
///   in extensions when a token was presented
#[instrument(skip_all, name = "tg.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS && !state.options.enable_auth_on_options {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();

    let token = match state.extractor.extract(&parts) {
        Ok(token) => token,
        Err(e) => return state.reject(&parts, &e),
    };

    let Some(token) = token else {
        if state.options.credentials_optional {
            tracing::debug!(target: "tg.middleware.auth", "No credentials, continuing unauthenticated");
            return next.run(Request::from_parts(parts, body)).await;
        }
        return state.reject(&parts, &AuthError::MissingCredentials);
    };

    let verified = match state.verifier.verify(token.expose_secret()).await {
        Ok(verified) => verified,
        Err(e) => return state.reject(&parts, &e),
    };

    metrics::record_token_validation("success", None);

    parts.extensions.insert(Identity {
        property: state.options.user_property.clone(),
        token: Arc::new(verified),
    });

    next.run(Request::from_parts(parts, body)).await
}

/// Verified token attached to a request by [`require_auth`].
///
/// Also an extractor: handlers that take `Identity` reject with
/// `MissingCredentials` when the request is unauthenticated, and
/// `Option<Identity>` accepts both.
#[derive(Debug, Clone)]
pub struct Identity {
    property: Arc<str>,
    token: Arc<VerifiedToken>,
}

impl Identity {
    /// Property name this identity was attached under.
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn token(&self) -> &VerifiedToken {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.token.claims
    }

    pub fn subject(&self) -> Option<&str> {
        self.token.claims.sub.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Extension trait for reading the verified token off a request.
pub trait IdentityExt {
    /// The verified token attached under `property`.
    ///
    /// Returns `None` if the request is unauthenticated or the middleware
    /// was configured with a different property name.
    fn identity(&self, property: &str) -> Option<&VerifiedToken>;
}

impl<B> IdentityExt for axum::http::Request<B> {
    fn identity(&self, property: &str) -> Option<&VerifiedToken> {
        self.extensions()
            .get::<Identity>()
            .filter(|identity| identity.property() == property)
            .map(Identity::token)
    }
}

impl IdentityExt for Parts {
    fn identity(&self, property: &str) -> Option<&VerifiedToken> {
        self.extensions
            .get::<Identity>()
            .filter(|identity| identity.property() == property)
            .map(Identity::token)
    }
}
