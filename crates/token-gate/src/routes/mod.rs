//! HTTP routes for Token Gate.
//!
//! Defines the Axum router.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Request timeout applied to every route.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Verified identity echo - requires authentication
/// - CORS allowing the configured audience as origin
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
///
/// CORS answers every `OPTIONS` request itself, so on protected routes it
/// sits outside auth only while pre-flight bypass is on. With
/// `enable_auth_on_options` set, auth wraps CORS and an `OPTIONS` request
/// must carry a valid token like any other.
pub fn build_routes(
    config: &Config,
    auth_state: Arc<AuthState>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let cors = cors_layer(&config.audience);
    let auth_on_options = auth_state.options.enable_auth_on_options;
    let auth = middleware::from_fn_with_state(auth_state, require_auth);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler))
                .with_state(metrics_handle),
        )
        .layer(cors.clone());

    let protected_routes = Router::new().route("/api/v1/me", get(handlers::get_me));
    let protected_routes = if auth_on_options {
        // `layer` rather than `route_layer`: OPTIONS on a GET route lands in
        // the method fallback, which only `layer` wraps
        protected_routes.layer(cors).layer(auth)
    } else {
        protected_routes.route_layer(auth).layer(cors)
    };

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost)
    public_routes
        .merge(protected_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// CORS policy: the audience is the only allowed browser origin.
fn cors_layer(audience: &str) -> CorsLayer {
    let allowed = HeaderValue::from_str(audience).ok();
    if allowed.is_none() {
        tracing::warn!(target: "tg.routes", "Audience is not a valid origin header value, CORS disabled");
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            allowed.as_ref() == Some(origin)
        }))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("sentry-trace"),
        ])
}
