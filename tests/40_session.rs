mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::Value;

#[tokio::test]
async fn protected_routes_require_a_bearer_token() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.client.get(server.url("/api/auth/whoami")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers().get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );

    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Unauthenticated.");

    let res = server
        .client
        .post(server.url("/api/auth/logout"))
        .header(header::AUTHORIZATION, "Basic abc")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn garbage_token_is_unauthenticated() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.get_authed("/api/auth/whoami", "not.a.jwt").await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_token() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = server.register("Ada", "ada@example.com").await?;

    let res = server.post_authed("/api/auth/logout", &token).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "logout successfully");

    let res = server.get_authed("/api/auth/whoami", &token).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Logging out twice is harmless
    let res = server.post_authed("/api/auth/logout", &token).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_leaves_other_sessions_alone() -> Result<()> {
    let server = common::spawn_server().await?;
    let first = server.register("Ada", "ada@example.com").await?;
    let second = server.login("ada@example.com", common::PASSWORD).await?;

    server.post_authed("/api/auth/logout", &first).await?;

    let res = server.get_authed("/api/auth/whoami", &second).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_the_token() -> Result<()> {
    let server = common::spawn_server().await?;
    let old = server.register("Ada", "ada@example.com").await?;

    let res = server.post_authed("/api/auth/refresh", &old).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["message"], "refresh successfully");
    let new = common::token_from(&body)?;
    assert_ne!(new, old);

    let res = server.get_authed("/api/auth/whoami", &new).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "success");
    assert_eq!(body["data"]["user"]["email"], "ada@example.com");

    // The presented token is spent
    let res = server.get_authed("/api/auth/whoami", &old).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = server.post_authed("/api/auth/refresh", &old).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
