//! Liveness probe.
//!
//! Token Gate holds no connections of its own, so liveness does not probe
//! the key-set authority: an unreachable authority fails requests, not the
//! process.

use tracing::instrument;

/// Handler for GET /health
#[instrument(skip_all, name = "tg.health.check")]
pub async fn health_check() -> &'static str {
    "OK"
}
