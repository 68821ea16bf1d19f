//! Test server harness for E2E testing
//!
//! Provides `TestGateServer`, which spawns a real Token Gate router on a
//! random port next to a wiremock key-set authority that publishes the
//! primary [`TestKeypair`].

use crate::crypto_fixtures::{jwks_document, TestKeypair};
use crate::token_builders::TestClaimsBuilder;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use token_gate::config::Config;
use token_gate::middleware::AuthState;
use token_gate::routes;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audience every test server is configured with.
pub const TEST_AUDIENCE: &str = "http://localhost:8081";

/// Tenant segment every test server is configured with.
pub const TEST_TENANT: &str = "shark-academy";

/// `kid` the default key is published under.
pub const TEST_KID: &str = "test-key-01";

/// Path of the key-set document on the mock authority.
pub fn jwks_path() -> String {
    format!("/t/{TEST_TENANT}/.well-known")
}

/// Test harness for spawning Token Gate in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_me_flow() -> Result<(), anyhow::Error> {
///     let server = TestGateServer::spawn().await?;
///     let token = server.keypair().sign(&server.claims().build());
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/api/v1/me", server.url()))
///         .bearer_auth(token)
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    config: Config,
    authority: MockServer,
    keypair: TestKeypair,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(HashMap::new()).await
    }

    /// Spawn with extra environment-style settings.
    ///
    /// The mock authority serves `{"keys": [<primary key>]}` under
    /// [`TEST_KID`]. `overrides` are applied last, so overriding
    /// `TG_AUTHORITY_URL` points the server somewhere else entirely.
    ///
    /// # Returns
    /// * `Ok(TestGateServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If configuration or bind fails
    pub async fn spawn_with(overrides: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let keypair = TestKeypair::new(TEST_KID);
        let authority = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[keypair.jwk()])))
            .mount(&authority)
            .await;

        let mut vars = HashMap::from([
            ("TG_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            ("TG_AUTHORITY_URL".to_string(), authority.uri()),
            ("TG_TENANT".to_string(), TEST_TENANT.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let auth_state = Arc::new(AuthState::from_config(&config));

        // Local recorder handle only; the global recorder stays untouched
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(&config, auth_state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            authority,
            keypair,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock key-set authority, for mounting extra responses.
    pub fn authority(&self) -> &MockServer {
        &self.authority
    }

    /// The key published under [`TEST_KID`].
    pub fn keypair(&self) -> &TestKeypair {
        &self.keypair
    }

    /// Claims that pass this server's issuer and audience checks.
    pub fn claims(&self) -> TestClaimsBuilder {
        TestClaimsBuilder::new(&self.config.issuer(), &self.config.audience)
    }

    /// Replace the published key set.
    pub async fn publish_keys(&self, keys: &[Value]) {
        self.authority.reset().await;
        Mock::given(method("GET"))
            .and(path(jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .mount(&self.authority)
            .await;
    }

    /// GET `/api/v1/me` with an optional raw `Authorization` value.
    pub async fn get_me(
        &self,
        authorization: Option<&str>,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let mut request = reqwest::Client::new().get(format!("{}/api/v1/me", self.url()));
        if let Some(value) = authorization {
            request = request.header("authorization", value);
        }
        Ok(request.send().await?)
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends
        self._handle.abort();
    }
}
