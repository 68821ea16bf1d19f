//! Token verification pipeline.
//!
//! - `extractor` - Pull the raw token out of a request
//! - `jwks` - Resolve signing keys from the authority's key set
//! - `claims` - Check exp, iat, iss and aud
//! - `verifier` - Run the full pipeline

pub mod claims;
pub mod extractor;
pub mod jwks;
pub mod verifier;

pub use claims::{Audience, Claims, ClaimsValidator, NumericDate};
pub use extractor::{BearerHeaderExtractor, CookieExtractor, FirstOf, TokenExtractor};
pub use jwks::{JwksClient, KeyResolver, ResolvedKey};
pub use verifier::{TokenHeader, VerifiedToken, Verifier};
