//! Bearer token verification.
//!
//! [`Verifier::verify`] runs a fixed sequence and stops at the first failure:
//!
//! 1. Parse the compact token into header and claims (`ParseError`)
//! 2. Validate claims: exp, iat, iss, aud
//! 3. Resolve the signing key by `kid`
//! 4. Check the declared `alg` against the configured algorithm
//! 5. Verify the signature with the resolved key
//!
//! Claims are checked before any network access, so an expired token is
//! reported as `TokenExpired` even when the key set cannot be reached.
//!
//! # Security
//!
//! - Tokens are size-checked before decoding (see `common::jwt`)
//! - The `alg` in the header never selects the verification algorithm; it
//!   must equal the configured one
//! - Every failure is returned to the caller; nothing here aborts the process

use crate::auth::claims::{Claims, ClaimsValidator};
use crate::auth::jwks::KeyResolver;
use crate::errors::AuthError;
use common::jwt::{decode_segment, decode_signature, split_token, Segment};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// JOSE header fields the verifier cares about.
///
/// `alg` is kept as the raw string so an unknown or unsupported value can
/// be reported back in `AlgorithmMismatch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// A token that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    pub header: TokenHeader,
    pub claims: Claims,
}

/// Verifies bearer tokens against a key source and a claims policy.
///
/// Holds no per-request state, so one instance is shared across all
/// requests behind an `Arc`.
pub struct Verifier {
    key_resolver: Arc<dyn KeyResolver>,
    claims_validator: ClaimsValidator,
    expected_algorithm: Algorithm,
}

impl Verifier {
    /// Create a new verifier.
    ///
    /// # Arguments
    ///
    /// * `key_resolver` - Source of verification keys
    /// * `claims_validator` - Expected issuer/audience and clock skew
    /// * `expected_algorithm` - The only `alg` a token may declare
    pub fn new(
        key_resolver: Arc<dyn KeyResolver>,
        claims_validator: ClaimsValidator,
        expected_algorithm: Algorithm,
    ) -> Self {
        Self {
            key_resolver,
            claims_validator,
            expected_algorithm,
        }
    }

    pub fn expected_algorithm(&self) -> Algorithm {
        self.expected_algorithm
    }

    /// Verify a raw compact token.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as an `AuthError`. See the module
    /// docs for the order.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        // 1. Parse
        let segments = split_token(token).map_err(|e| {
            tracing::debug!(target: "tg.auth.verifier", error = %e, "Token rejected: malformed");
            AuthError::ParseError
        })?;
        let header: TokenHeader =
            decode_segment(segments.header, Segment::Header).map_err(parse_error)?;
        let claims: Claims =
            decode_segment(segments.payload, Segment::Payload).map_err(parse_error)?;
        decode_signature(segments.signature).map_err(parse_error)?;

        // 2. Claims
        self.claims_validator.validate(&claims)?;

        // 3. Key
        let kid = header.kid.as_deref().ok_or_else(|| {
            tracing::debug!(target: "tg.auth.verifier", "Token rejected: header has no kid");
            AuthError::KeyNotFound
        })?;
        let key = self.key_resolver.resolve(kid).await?;

        // 4. Algorithm
        let algorithm = self.check_algorithm(&header.alg)?;

        // 5. Signature
        let decoding_key = key.decoding_key(algorithm).map_err(|e| {
            tracing::warn!(target: "tg.auth.verifier", kid = %kid, error = %e, "Resolved key unusable for algorithm");
            AuthError::InvalidSignature
        })?;

        let valid = jsonwebtoken::crypto::verify(
            segments.signature,
            segments.signing_input.as_bytes(),
            &decoding_key,
            algorithm,
        )
        .map_err(|e| {
            tracing::debug!(target: "tg.auth.verifier", error = %e, "Signature verification errored");
            AuthError::InvalidSignature
        })?;

        if !valid {
            tracing::debug!(target: "tg.auth.verifier", kid = %kid, "Token rejected: signature mismatch");
            return Err(AuthError::InvalidSignature);
        }

        tracing::debug!(target: "tg.auth.verifier", kid = %kid, "Token verified");

        Ok(VerifiedToken { header, claims })
    }

    fn check_algorithm(&self, declared: &str) -> Result<Algorithm, AuthError> {
        match Algorithm::from_str(declared) {
            Ok(alg) if alg == self.expected_algorithm => Ok(alg),
            _ => {
                tracing::debug!(
                    target: "tg.auth.verifier",
                    expected = ?self.expected_algorithm,
                    actual = %declared,
                    "Token rejected: algorithm mismatch"
                );
                Err(AuthError::AlgorithmMismatch {
                    expected: format!("{:?}", self.expected_algorithm),
                    actual: declared.to_string(),
                })
            }
        }
    }
}

fn parse_error(e: common::jwt::JwtFormatError) -> AuthError {
    tracing::debug!(target: "tg.auth.verifier", error = %e, "Token rejected: malformed");
    AuthError::ParseError
}
