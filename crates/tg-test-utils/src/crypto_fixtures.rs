//! RSA key fixtures for signing test tokens.
//!
//! Generating a 2048-bit RSA key is slow, so key material is generated once
//! per test process and shared. Two independent keys are available:
//! [`TestKeypair::new`] and [`TestKeypair::alternate`]. The `kid` is chosen
//! by the caller, so the same key can be published under any identifier.
//!
//! Each key comes with a self-signed X.509 certificate, which is what the
//! key-set authority publishes in `x5c`.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use std::sync::OnceLock;

const RSA_BITS: usize = 2048;

struct KeyMaterial {
    private_key_pem: String,
    n: String,
    e: String,
    certificate_der_b64: String,
}

static PRIMARY: OnceLock<KeyMaterial> = OnceLock::new();
static ALTERNATE: OnceLock<KeyMaterial> = OnceLock::new();

fn generate_key_material() -> KeyMaterial {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, RSA_BITS).expect("Failed to generate RSA key");
    let public_key = private_key.to_public_key();

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("Failed to encode private key")
        .to_string();

    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

    let key_pair =
        rcgen::KeyPair::from_pem(&private_key_pem).expect("Failed to load RSA key into rcgen");
    let certificate = rcgen::CertificateParams::new(vec!["token-gate.test".to_string()])
        .expect("Failed to build certificate params")
        .self_signed(&key_pair)
        .expect("Failed to self-sign certificate");
    let certificate_der_b64 = STANDARD.encode(certificate.der());

    KeyMaterial {
        private_key_pem,
        n,
        e,
        certificate_der_b64,
    }
}

/// An RSA signing key published under a chosen `kid`.
#[derive(Clone)]
pub struct TestKeypair {
    kid: String,
    material: &'static KeyMaterial,
}

impl TestKeypair {
    /// The primary test key under `kid`.
    pub fn new(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            material: PRIMARY.get_or_init(generate_key_material),
        }
    }

    /// A second key, distinct from [`TestKeypair::new`], for wrong-key tests.
    pub fn alternate(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            material: ALTERNATE.get_or_init(generate_key_material),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// PKCS#8 PEM private key.
    pub fn private_key_pem(&self) -> &str {
        &self.material.private_key_pem
    }

    /// Base64 DER of the self-signed certificate, as it appears in `x5c`.
    pub fn x5c_leaf(&self) -> &str {
        &self.material.certificate_der_b64
    }

    /// RSA modulus and exponent, base64url.
    pub fn rsa_components(&self) -> (&str, &str) {
        (&self.material.n, &self.material.e)
    }

    /// JWK with both `x5c` and `n`/`e`.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.material.n,
            "e": self.material.e,
            "x5c": [self.material.certificate_der_b64],
        })
    }

    /// JWK without `x5c`, only the RSA components.
    pub fn jwk_components_only(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.material.n,
            "e": self.material.e,
        })
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_rsa_pem(self.material.private_key_pem.as_bytes())
            .expect("Failed to load RSA encoding key")
    }

    /// Sign `claims` with RS256 and this key's `kid`.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_algorithm(Algorithm::RS256, claims)
    }

    /// Sign with another RSA algorithm, keeping the `kid`.
    pub fn sign_with_algorithm(&self, algorithm: Algorithm, claims: &Value) -> String {
        let mut header = Header::new(algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key()).expect("Failed to sign test token")
    }

    /// Sign with RS256 but no `kid` in the header.
    pub fn sign_without_kid(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        encode(&header, claims, &self.encoding_key()).expect("Failed to sign test token")
    }
}

/// Sign `claims` with HS256 under `kid`, for algorithm-confusion tests.
pub fn sign_hs256(secret: &[u8], kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).expect("Failed to sign HS256 token")
}

/// Key-set document `{"keys": [...]}`.
pub fn jwks_document(keys: &[Value]) -> Value {
    json!({ "keys": keys })
}
