//! JWT wire-format utilities shared across Token Gate crates.
//!
//! This module provides the low-level pieces of JWT handling that do not
//! depend on any key material:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Splitting a compact JWT into its three segments
//! - Decoding a base64url JSON segment into a typed value
//! - Checking the signature segment is well-formed base64url
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any splitting or decoding
//! - Nothing here verifies a signature; callers MUST verify before trusting
//!   anything decoded from a token
//! - Errors never echo token contents
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{split_token, decode_segment};
//!
//! let segments = split_token(token)?;
//! let header: RawHeader = decode_segment(segments.header, Segment::Header)?;
//! // ... resolve key, then verify segments.signature over segments.signing_input
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected before any base64 decoding or
/// cryptographic work. Typical RS256 access tokens are well under 2KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with an `iat` more than this far in the future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Which part of a compact JWT a decoding error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Header,
    Payload,
    Signature,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Header => f.write_str("header"),
            Segment::Payload => f.write_str("payload"),
            Segment::Signature => f.write_str("signature"),
        }
    }
}

/// Errors produced while taking a compact JWT apart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtFormatError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("token exceeds 8192 bytes")]
    TokenTooLarge,

    /// Token does not have exactly three dot-separated segments.
    #[error("expected 3 token segments, found {0}")]
    WrongSegmentCount(usize),

    /// A segment is empty or not valid base64url.
    #[error("{0} segment is not valid base64url")]
    InvalidBase64(Segment),

    /// A segment decoded but is not the expected JSON shape.
    #[error("{0} segment is not valid JSON")]
    InvalidJson(Segment),
}

// =============================================================================
// Segments
// =============================================================================

/// The three segments of a compact JWT, borrowed from the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSegments<'a> {
    /// base64url-encoded JOSE header.
    pub header: &'a str,

    /// base64url-encoded claim set.
    pub payload: &'a str,

    /// base64url-encoded signature.
    pub signature: &'a str,

    /// `header.payload`, the bytes the signature covers.
    pub signing_input: &'a str,
}

/// Split a compact JWT into its segments.
///
/// # Errors
///
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `WrongSegmentCount` if the token is not `header.payload.signature`
pub fn split_token(token: &str) -> Result<TokenSegments<'_>, JwtFormatError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtFormatError::TokenTooLarge);
    }

    let segment_count = token.split('.').count();
    if segment_count != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = segment_count,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtFormatError::WrongSegmentCount(segment_count));
    }

    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or(JwtFormatError::WrongSegmentCount(segment_count))?;
    let (header, payload) = signing_input
        .split_once('.')
        .ok_or(JwtFormatError::WrongSegmentCount(segment_count))?;

    Ok(TokenSegments {
        header,
        payload,
        signature,
        signing_input,
    })
}

/// Decode one base64url JSON segment into `T`.
///
/// # Errors
///
/// - `InvalidBase64` if the segment is empty or not base64url without padding
/// - `InvalidJson` if the decoded bytes do not deserialize into `T`
pub fn decode_segment<T: DeserializeOwned>(
    encoded: &str,
    segment: Segment,
) -> Result<T, JwtFormatError> {
    if encoded.is_empty() {
        return Err(JwtFormatError::InvalidBase64(segment));
    }

    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
        tracing::debug!(target: "common.jwt", %segment, error = %e, "Failed to decode JWT segment base64");
        JwtFormatError::InvalidBase64(segment)
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", %segment, error = %e, "Failed to parse JWT segment JSON");
        JwtFormatError::InvalidJson(segment)
    })
}

/// Decode the signature segment to raw bytes.
///
/// # Errors
///
/// Returns `InvalidBase64(Segment::Signature)` if the segment is empty or
/// not base64url without padding.
pub fn decode_signature(encoded: &str) -> Result<Vec<u8>, JwtFormatError> {
    if encoded.is_empty() {
        return Err(JwtFormatError::InvalidBase64(Segment::Signature));
    }

    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| JwtFormatError::InvalidBase64(Segment::Signature))
}

// =============================================================================
// Tests
// =============================================================================
