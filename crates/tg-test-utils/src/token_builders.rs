//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating test token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// Defaults produce claims that pass validation for the given issuer and
/// audience: `exp` one hour out, `iat` now.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new(issuer, audience)
///     .for_user("alice")
///     .expires_in(600)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestClaimsBuilder {
    sub: Option<String>,
    iss: Option<String>,
    aud: Option<Value>,
    exp: Option<Value>,
    iat: Option<Value>,
    nbf: Option<Value>,
    extra: Map<String, Value>,
}

impl TestClaimsBuilder {
    /// Create a new claims builder with valid defaults
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: Some("test-subject".to_string()),
            iss: Some(issuer.to_string()),
            aud: Some(json!(audience)),
            exp: Some(json!((now + Duration::seconds(3600)).timestamp())),
            iat: Some(json!(now.timestamp())),
            nbf: None,
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some(json!((Utc::now() + Duration::seconds(seconds)).timestamp()));
        self
    }

    /// Set `exp` to an exact value (integer, fractional, or any JSON)
    pub fn expires_at(mut self, value: impl Into<Value>) -> Self {
        self.exp = Some(value.into());
        self
    }

    /// Expired one hour ago, issued two hours ago
    pub fn expired(mut self) -> Self {
        let now = Utc::now();
        self.exp = Some(json!((now - Duration::seconds(3600)).timestamp()));
        self.iat = Some(json!((now - Duration::seconds(7200)).timestamp()));
        self
    }

    pub fn without_exp(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, value: impl Into<Value>) -> Self {
        self.iat = Some(value.into());
        self
    }

    /// Set not-before timestamp
    pub fn not_before(mut self, value: impl Into<Value>) -> Self {
        self.nbf = Some(value.into());
        self
    }

    pub fn without_iat(mut self) -> Self {
        self.iat = None;
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    pub fn without_issuer(mut self) -> Self {
        self.iss = None;
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(json!(audience));
        self
    }

    /// Array-valued `aud`
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = Some(json!(audiences));
        self
    }

    pub fn without_audience(mut self) -> Self {
        self.aud = None;
        self
    }

    /// Add a non-registered claim
    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }

    /// Build the claims as a JSON value; unset claims are omitted
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        if let Some(iss) = self.iss {
            claims.insert("iss".to_string(), json!(iss));
        }
        if let Some(aud) = self.aud {
            claims.insert("aud".to_string(), aud);
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), exp);
        }
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), iat);
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), nbf);
        }
        Value::Object(claims)
    }
}
