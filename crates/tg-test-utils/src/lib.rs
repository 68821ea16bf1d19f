//! # Token Gate Test Utilities
//!
//! Shared test utilities for Token Gate.
//!
//! This crate provides:
//! - RSA key fixtures with matching JWK entries (`x5c` certificate and `n`/`e`)
//! - Claim builders (`TestClaimsBuilder`)
//! - A mock key-set authority and a spawned Token Gate server (`TestGateServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tg_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestGateServer::spawn().await?;
//!     let token = server.keypair().sign(&server.claims().for_user("alice").build());
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
