//! JWT claims and claim validation.
//!
//! The `sub` field is redacted in Debug output to prevent exposure in logs.
//!
//! Validation order is fixed and short-circuits on the first failure:
//!
//! 1. `exp` - present and strictly after now, else `TokenExpired`
//! 2. `iat` - present and not beyond now + clock skew, else `InvalidIssuedAt`
//! 3. `nbf` - if present, not beyond now + clock skew, else `TokenNotYetValid`
//! 4. `iss` - equals `<authority>/t/<tenant>`, else `InvalidIssuer`
//! 5. `aud` - contains the configured audience, else `InvalidAudience`
//!
//! A missing `iat` is treated as invalid rather than skipped. Time claims
//! may carry fractional seconds; a time claim that is not a number fails
//! its own check, not the payload decode.

use crate::errors::AuthError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The `aud` claim, which JWT allows as a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `expected` is (one of) the audience value(s).
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == expected,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// A `NumericDate` claim value: seconds since the Unix epoch.
///
/// Holds the raw JSON value so that integers and fractional seconds both
/// decode, and so the claim serializes back exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumericDate(serde_json::Value);

impl NumericDate {
    /// Seconds since the epoch, or `None` if the value is not a number.
    pub fn seconds(&self) -> Option<f64> {
        self.0.as_f64()
    }
}

impl From<i64> for NumericDate {
    fn from(seconds: i64) -> Self {
        Self(serde_json::Value::from(seconds))
    }
}

impl From<f64> for NumericDate {
    fn from(seconds: f64) -> Self {
        Self(serde_json::Value::from(seconds))
    }
}

/// JWT claim set.
///
/// Registered claims are optional at the type level so that a missing
/// claim surfaces as the matching validation error rather than a parse
/// failure. Everything else lands in `extra`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<NumericDate>,

    /// Issued-at time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<NumericDate>,

    /// Not-before time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<NumericDate>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Any claims not listed above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("extra_claims", &self.extra.len())
            .finish()
    }
}

impl Claims {
    /// Look up a non-registered claim by name.
    pub fn extra(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}

/// Checks time-bounded and identity claims against expected values.
#[derive(Debug, Clone)]
pub struct ClaimsValidator {
    issuer: String,
    audience: String,
    clock_skew_seconds: i64,
}

impl ClaimsValidator {
    /// Create a validator.
    ///
    /// # Arguments
    ///
    /// * `issuer` - Exact expected `iss` value
    /// * `audience` - Expected `aud` value
    /// * `clock_skew_seconds` - Tolerance for `iat` and `nbf` in the future
    pub fn new(issuer: String, audience: String, clock_skew_seconds: i64) -> Self {
        Self {
            issuer,
            audience,
            clock_skew_seconds,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Validate claims against the current wall clock.
    pub fn validate(&self, claims: &Claims) -> Result<(), AuthError> {
        self.validate_at(claims, chrono::Utc::now().timestamp())
    }

    /// Deterministic validation against an explicit `now` timestamp.
    pub fn validate_at(&self, claims: &Claims, now: i64) -> Result<(), AuthError> {
        check_expiry(claims, now)?;
        check_issued_at(claims, now, self.clock_skew_seconds)?;
        check_not_before(claims, now, self.clock_skew_seconds)?;
        check_issuer(claims, &self.issuer)?;
        check_audience(claims, &self.audience)?;
        Ok(())
    }
}

fn seconds(date: Option<&NumericDate>) -> Option<f64> {
    date.and_then(NumericDate::seconds)
}

fn check_expiry(claims: &Claims, now: i64) -> Result<(), AuthError> {
    match seconds(claims.exp.as_ref()) {
        Some(exp) if exp > now as f64 => Ok(()),
        exp => {
            tracing::debug!(target: "tg.auth.claims", ?exp, now, "Token rejected: expired or missing exp");
            Err(AuthError::TokenExpired)
        }
    }
}

fn check_issued_at(claims: &Claims, now: i64, clock_skew_seconds: i64) -> Result<(), AuthError> {
    let max_iat = now.saturating_add(clock_skew_seconds);
    match seconds(claims.iat.as_ref()) {
        Some(iat) if iat <= max_iat as f64 => Ok(()),
        iat => {
            tracing::debug!(
                target: "tg.auth.claims",
                ?iat,
                now,
                max_allowed = max_iat,
                "Token rejected: iat missing or too far in the future"
            );
            Err(AuthError::InvalidIssuedAt)
        }
    }
}

fn check_not_before(claims: &Claims, now: i64, clock_skew_seconds: i64) -> Result<(), AuthError> {
    let Some(nbf) = &claims.nbf else {
        return Ok(());
    };
    let max_nbf = now.saturating_add(clock_skew_seconds);
    match nbf.seconds() {
        Some(nbf) if nbf <= max_nbf as f64 => Ok(()),
        nbf => {
            tracing::debug!(
                target: "tg.auth.claims",
                ?nbf,
                now,
                max_allowed = max_nbf,
                "Token rejected: not valid yet"
            );
            Err(AuthError::TokenNotYetValid)
        }
    }
}

fn check_issuer(claims: &Claims, expected: &str) -> Result<(), AuthError> {
    if claims.iss.as_deref() == Some(expected) {
        Ok(())
    } else {
        tracing::debug!(target: "tg.auth.claims", present = claims.iss.is_some(), "Token rejected: issuer mismatch");
        Err(AuthError::InvalidIssuer)
    }
}

fn check_audience(claims: &Claims, expected: &str) -> Result<(), AuthError> {
    match &claims.aud {
        Some(aud) if aud.contains(expected) => Ok(()),
        aud => {
            tracing::debug!(target: "tg.auth.claims", present = aud.is_some(), "Token rejected: audience mismatch");
            Err(AuthError::InvalidAudience)
        }
    }
}
