//! Secret types for keeping bearer tokens out of logs.
//!
//! Re-exports [`secrecy`] types. A raw bearer token is a credential: anyone
//! holding it can replay it until it expires. Token Gate carries the raw
//! token as a [`SecretString`] from the moment it is extracted from a request
//! until it is handed to the verifier, so that any struct holding it gets a
//! redacted `Debug` impl for free.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let token = SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.c2ln");
//! assert!(!format!("{token:?}").contains("eyJ"));
//!
//! // Access requires an explicit call
//! let raw: &str = token.expose_secret();
//! assert!(raw.starts_with("eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
