//! Token Gate configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! is immutable afterwards. The three identity settings (audience,
//! authority, tenant) are required and have no defaults.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default timeout for a single JWKS fetch.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default request-extension property the verified token is stored under.
pub const DEFAULT_USER_PROPERTY: &str = "user";

/// How rejected requests are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorFormat {
    /// 401 with the error message as a plain-text body.
    #[default]
    Text,

    /// JSON error envelope with the error's own status code.
    Json,
}

/// Token Gate configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// Expected `aud` claim. Also the allowed CORS origin.
    pub audience: String,

    /// Base URL of the key-publishing authority, e.g. `https://auth.example.com`.
    pub authority_url: String,

    /// Tenant segment used in both the issuer and the JWKS URL.
    pub tenant: String,

    /// Signing algorithm tokens must declare (default: RS256).
    pub jwt_algorithm: Algorithm,

    /// Clock skew tolerance in seconds for iat validation.
    pub jwt_clock_skew_seconds: i64,

    /// Timeout for each JWKS fetch.
    pub jwks_fetch_timeout_seconds: u64,

    /// JWKS cache TTL in seconds. Zero disables caching (fetch per request).
    pub jwks_cache_ttl_seconds: u64,

    /// Let requests without any token through unauthenticated.
    pub credentials_optional: bool,

    /// Verify tokens on OPTIONS (pre-flight) requests too.
    pub enable_auth_on_options: bool,

    /// Name the verified token is attached under.
    pub user_property: String,

    /// Log each rejection reason at info level instead of debug.
    pub debug: bool,

    /// Response format for rejected requests.
    pub error_format: ErrorFormat,

    /// Seconds to wait for in-flight requests after a shutdown signal.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("audience", &self.audience)
            .field("authority_url", &self.authority_url)
            .field("tenant", &self.tenant)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field(
                "jwks_fetch_timeout_seconds",
                &self.jwks_fetch_timeout_seconds,
            )
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("credentials_optional", &self.credentials_optional)
            .field("enable_auth_on_options", &self.enable_auth_on_options)
            .field("user_property", &self.user_property)
            .field("debug", &self.debug)
            .field("error_format", &self.error_format)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid boolean for {name}: '{value}'")]
    InvalidBool { name: String, value: String },

    #[error("Invalid TG_ERROR_FORMAT '{0}': expected 'text' or 'json'")]
    InvalidErrorFormat(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let audience = required(vars, "TG_AUDIENCE")?;
        let authority_url = required(vars, "TG_AUTHORITY_URL")?
            .trim_end_matches('/')
            .to_string();
        let tenant = required(vars, "TG_TENANT")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt_algorithm = match vars.get("TG_JWT_ALGORITHM") {
            Some(value) => parse_algorithm(value)?,
            None => Algorithm::RS256,
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwks(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidJwks(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let jwks_cache_ttl_seconds = match vars.get("JWKS_CACHE_TTL_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => 0,
        };

        let credentials_optional = parse_bool(vars, "TG_CREDENTIALS_OPTIONAL")?;
        let enable_auth_on_options = parse_bool(vars, "TG_AUTH_ON_OPTIONS")?;
        let debug = parse_bool(vars, "TG_DEBUG")?;

        let user_property = vars
            .get("TG_USER_PROPERTY")
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_PROPERTY.to_string());

        let error_format = match vars.get("TG_ERROR_FORMAT").map(|v| v.trim().to_ascii_lowercase()) {
            None => ErrorFormat::default(),
            Some(v) => match v.as_str() {
                "" | "text" => ErrorFormat::Text,
                "json" => ErrorFormat::Json,
                _ => return Err(ConfigError::InvalidErrorFormat(v)),
            },
        };

        let drain_seconds = vars
            .get("TG_DRAIN_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Ok(Config {
            bind_address,
            audience,
            authority_url,
            tenant,
            jwt_algorithm,
            jwt_clock_skew_seconds,
            jwks_fetch_timeout_seconds,
            jwks_cache_ttl_seconds,
            credentials_optional,
            enable_auth_on_options,
            user_property,
            debug,
            error_format,
            drain_seconds,
        })
    }

    /// Expected `iss` claim: `<authority>/t/<tenant>`.
    pub fn issuer(&self) -> String {
        format!("{}/t/{}", self.authority_url, self.tenant)
    }

    /// Key-set discovery URL: `<authority>/t/<tenant>/.well-known`.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known", self.issuer())
    }

    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_bool(vars: &HashMap<String, String>, name: &str) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                name: name.to_string(),
                value: v,
            }),
        },
    }
}

/// Keys come from a public key set, so shared-secret algorithms make no sense.
fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(value.trim()).map_err(|_| {
        ConfigError::InvalidAlgorithm(format!("unknown algorithm '{}'", value))
    })?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(ConfigError::InvalidAlgorithm(format!(
                "{:?} requires a shared secret and cannot be verified from a key set",
                algorithm
            )))
        }
        _ => Ok(algorithm),
    }
}
