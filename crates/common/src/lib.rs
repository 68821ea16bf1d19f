//! Common utilities shared across Token Gate crates.

#![warn(clippy::pedantic)]

/// Module for JWT wire-format utilities (size limits, segment decoding)
pub mod jwt;

/// Module for secret types that prevent accidental logging of tokens
pub mod secret;
