mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in [
        "/api/auth/quien-soy",
        "/api/expedientes",
        "/api/victimas",
        "/api/reportes/operativo",
        "/api/admin/usuarios",
        "/api/catalogos/areas",
    ] {
        let res = client
            .get(format!("{}{}", server.base_url, path))
            .send()
            .await?;
        assert_eq!(
            res.status(),
            StatusCode::UNAUTHORIZED,
            "{} should reject anonymous callers",
            path
        );

        let body = res.json::<serde_json::Value>().await?;
        assert_eq!(body["code"], "UNAUTHORIZED", "body: {}", body);
    }

    Ok(())
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/expedientes", server.base_url))
        .header("Authorization", "Bearer not-a-jwt")
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_requires_a_json_body() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .send()
        .await?;

    assert!(
        res.status().is_client_error(),
        "expected client error, got {}",
        res.status()
    );
    Ok(())
}

#[tokio::test]
async fn login_with_bad_credentials_never_succeeds() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let payload = json!({
        "usuario": "nadie",
        "password": "tampoco"
    });

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&payload)
        .send()
        .await?;

    // 401 with a database behind the server; 5xx without one. Either way,
    // never a token.
    assert!(
        res.status() == StatusCode::UNAUTHORIZED || res.status().is_server_error(),
        "unexpected status: {}",
        res.status()
    );

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"], true, "body: {}", body);
    assert!(body.get("token").is_none());
    Ok(())
}
