//! Observability for Token Gate.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
