//! JWKS client for resolving token signing keys from the authority.
//!
//! The key set is published at `<authority>/t/<tenant>/.well-known` as
//! `{"keys": [{"kid": "...", "x5c": ["..."], ...}]}`.
//!
//! By default every lookup fetches the key set fresh. An optional in-memory
//! cache can be enabled with a TTL; when it is, a lookup for a `kid` that is
//! not in the cached set always re-fetches before giving up, so a rotated
//! key is picked up immediately.
//!
//! # Security
//!
//! - Fetches are bounded by a client timeout
//! - A fetch failure rejects only the request that triggered it
//! - Key material is never logged

use crate::errors::AuthError;
use crate::observability::metrics;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default JWKS fetch timeout (10 seconds).
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const PEM_CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_CERT_END: &str = "-----END CERTIFICATE-----";

/// JSON Web Key from the key set document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID - used to select the correct key for verification.
    /// Entries without one can never match.
    #[serde(default)]
    pub kid: String,

    /// Key type ("RSA", "EC", "OKP").
    #[serde(default)]
    pub kty: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm hint.
    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// X.509 certificate chain, leaf first (standard base64 DER).
    #[serde(default)]
    pub x5c: Vec<String>,
}

/// Key set document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Public key material for one `kid`, ready to become a `DecodingKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedKey {
    /// PEM certificate built from the first `x5c` entry.
    Certificate(String),

    /// RSA modulus and exponent, both base64url.
    RsaComponents { n: String, e: String },
}

impl ResolvedKey {
    /// Pick the usable key material out of a JWK, preferring `x5c`.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if let Some(leaf) = jwk.x5c.first().filter(|c| !c.is_empty()) {
            return Some(ResolvedKey::Certificate(pem_certificate(leaf)));
        }

        match (&jwk.n, &jwk.e) {
            (Some(n), Some(e)) => Some(ResolvedKey::RsaComponents {
                n: n.clone(),
                e: e.clone(),
            }),
            _ => None,
        }
    }

    /// PEM certificate text, if this key came from `x5c`.
    pub fn pem(&self) -> Option<&str> {
        match self {
            ResolvedKey::Certificate(pem) => Some(pem),
            ResolvedKey::RsaComponents { .. } => None,
        }
    }

    /// Build a verification key for `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns the underlying `jsonwebtoken` error if the key material does
    /// not parse or does not fit the algorithm family.
    pub fn decoding_key(
        &self,
        algorithm: Algorithm,
    ) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        use jsonwebtoken::errors::ErrorKind;

        match (self, algorithm) {
            (
                ResolvedKey::Certificate(pem),
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512,
            ) => DecodingKey::from_rsa_pem(pem.as_bytes()),
            (ResolvedKey::Certificate(pem), Algorithm::ES256 | Algorithm::ES384) => {
                DecodingKey::from_ec_pem(pem.as_bytes())
            }
            (ResolvedKey::Certificate(pem), Algorithm::EdDSA) => {
                DecodingKey::from_ed_pem(pem.as_bytes())
            }
            (
                ResolvedKey::RsaComponents { n, e },
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512,
            ) => DecodingKey::from_rsa_components(n, e),
            _ => Err(ErrorKind::InvalidAlgorithm.into()),
        }
    }
}

/// Wrap a base64 DER certificate in PEM markers.
pub fn pem_certificate(der_b64: &str) -> String {
    format!("{PEM_CERT_BEGIN}\n{der_b64}\n{PEM_CERT_END}")
}

/// Source of verification keys, looked up by `kid`.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve the key for `kid`.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeySetUnavailable` if the key set cannot be fetched or decoded
    /// - `AuthError::KeyNotFound` if no usable entry matches `kid`
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey, AuthError>;
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When this cache entry expires.
    expires_at: Instant,
}

/// JWKS client for fetching public keys from the authority.
pub struct JwksClient {
    /// URL to the key set document.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached JWKS data; only used when `cache_ttl` is non-zero.
    cache: Arc<RwLock<Option<CachedJwks>>>,

    /// Cache TTL duration. Zero disables caching.
    cache_ttl: Duration,
}

impl JwksClient {
    /// Create a client that fetches on every lookup.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the authority's key set document
    pub fn new(jwks_url: String) -> Self {
        Self::with_options(jwks_url, DEFAULT_FETCH_TIMEOUT, Duration::ZERO)
    }

    /// Create a client with a custom fetch timeout and cache TTL.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the authority's key set document
    /// * `fetch_timeout` - Upper bound on a single fetch
    /// * `cache_ttl` - How long to keep a fetched key set; zero disables caching
    pub fn with_options(jwks_url: String, fetch_timeout: Duration, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "tg.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    fn caching_enabled(&self) -> bool {
        !self.cache_ttl.is_zero()
    }

    /// Get a JWK by key ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` if the JWKS cannot be fetched.
    /// Returns `AuthError::KeyNotFound` if the key ID is not found.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        if self.caching_enabled() {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "tg.auth.jwks", kid = %kid, "JWKS cache hit");
                        metrics::record_jwks_cache("hit");
                        return Ok(key.clone());
                    }
                    // A miss on a fresh cache may be a rotated key: fall through and re-fetch
                    tracing::debug!(target: "tg.auth.jwks", kid = %kid, "Key not in JWKS cache, re-fetching");
                }
            }
            metrics::record_jwks_cache("miss");
        }

        let keys = self.fetch_keys().await?;
        let found = keys.get(kid).cloned();

        if self.caching_enabled() {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedJwks {
                keys,
                expires_at: Instant::now() + self.cache_ttl,
            });
        }

        found.ok_or_else(|| {
            tracing::debug!(target: "tg.auth.jwks", kid = %kid, "Key not found in JWKS");
            AuthError::KeyNotFound
        })
    }

    /// Fetch the key set document and index it by `kid`.
    ///
    /// When several entries share a `kid`, the first one wins.
    #[instrument(skip(self))]
    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, AuthError> {
        tracing::debug!(target: "tg.auth.jwks", url = %self.jwks_url, "Fetching JWKS");
        let start = Instant::now();

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "tg.auth.jwks", error = %e, "Failed to fetch JWKS");
                metrics::record_jwks_fetch("error", start.elapsed());
                AuthError::KeySetUnavailable
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "tg.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            metrics::record_jwks_fetch("error", start.elapsed());
            return Err(AuthError::KeySetUnavailable);
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "tg.auth.jwks", error = %e, "Failed to parse JWKS response");
            metrics::record_jwks_fetch("error", start.elapsed());
            AuthError::KeySetUnavailable
        })?;

        metrics::record_jwks_fetch("success", start.elapsed());

        let mut keys: HashMap<String, Jwk> = HashMap::with_capacity(jwks.keys.len());
        for key in jwks.keys {
            keys.entry(key.kid.clone()).or_insert(key);
        }

        tracing::debug!(target: "tg.auth.jwks", key_count = keys.len(), "JWKS fetched");

        Ok(keys)
    }

    /// Clear the cache.
    #[cfg(test)]
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

#[async_trait]
impl KeyResolver for JwksClient {
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey, AuthError> {
        let jwk = self.get_key(kid).await?;
        ResolvedKey::from_jwk(&jwk).ok_or_else(|| {
            tracing::warn!(target: "tg.auth.jwks", kid = %kid, "JWK has neither x5c nor n/e");
            AuthError::KeyNotFound
        })
    }
}
