#![allow(dead_code)]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use auth_api_rust::app;
use auth_api_rust::config::AppConfig;
use auth_api_rust::state::AppState;

pub const PASSWORD: &str = "secret123";

/// A server bound to an ephemeral port, owned by a single test.
///
/// Each `#[tokio::test]` runs its own runtime, so servers are never shared
/// between tests.
pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    pub client: Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    pub async fn get_authed(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.client.get(self.url(path)).bearer_auth(token).send().await?)
    }

    pub async fn post_authed(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.client.post(self.url(path)).bearer_auth(token).send().await?)
    }

    /// Register an account and return the issued token
    pub async fn register(&self, name: &str, email: &str) -> Result<String> {
        let res = self
            .post_json(
                "/auth/register",
                &json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "password_confirmation": PASSWORD,
                }),
            )
            .await?;
        anyhow::ensure!(res.status().is_success(), "register failed: {}", res.status());

        let body: Value = res.json().await?;
        token_from(&body)
    }

    /// Log in and return the issued token
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let res = self
            .post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await?;
        anyhow::ensure!(res.status().is_success(), "login failed: {}", res.status());

        let body: Value = res.json().await?;
        token_from(&body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn token_from(body: &Value) -> Result<String> {
    body["data"]["token"]["token"]
        .as_str()
        .map(str::to_string)
        .context("response carries no token")
}

/// Development settings with cheap hashing and a tight throttle
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.url = None;
    config.security.hash_memory_kib = 1024;
    config.security.hash_iterations = 1;
    config.throttle.max_attempts = 3;
    config.throttle.lockout_secs = 60;
    config
}

pub async fn spawn_server() -> Result<TestServer> {
    spawn_server_with(test_config()).await
}

pub async fn spawn_server_with(config: AppConfig) -> Result<TestServer> {
    let state = AppState::from_config(config).await?;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = app::serve(listener, state, async {
            let _ = rx.await;
        })
        .await;
    });

    Ok(TestServer {
        addr,
        base_url: format!("http://{}", addr),
        client: Client::new(),
        shutdown: Some(tx),
    })
}
