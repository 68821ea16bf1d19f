//! Public endpoint integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use tg_test_utils::TestGateServer;

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<()> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

/// Public routes never consult the key set.
#[tokio::test]
async fn test_health_does_not_require_auth_or_key_set() -> Result<()> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/health", server.url()))
        .header("authorization", "Basic xyz")
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert!(server.authority().received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<()> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/v1/unknown", server.url())).await?;

    assert_eq!(response.status(), 404);

    Ok(())
}
