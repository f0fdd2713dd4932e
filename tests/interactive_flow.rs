//! End-to-end interactive flow against a local token-endpoint stub.

use std::net::TcpListener;
use std::time::Duration;

use axum::{Json, Router, routing::post};
use gtasks_connect::{Authenticator, Error, OAuthConfig, TokenStore};
use tempfile::TempDir;

async fn spawn_token_stub() -> String {
    let app = Router::new().route(
        "/token",
        post(|| async {
            Json(serde_json::json!({
                "access_token": "stub-access",
                "refresh_token": "stub-refresh",
                "token_type": "Bearer",
                "scope": "https://www.googleapis.com/auth/tasks",
                "expires_in": 3599
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/token")
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn consent_url_parts(auth_url: &str) -> (String, String) {
    let url = url::Url::parse(auth_url).unwrap();
    let mut redirect_uri = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "redirect_uri" => redirect_uri = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }
    (redirect_uri.unwrap(), state.unwrap())
}

#[tokio::test]
async fn interactive_flow_persists_and_round_trips_credentials() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::with_path(dir.path().join("token.json"));
    let token_url = spawn_token_stub().await;

    let config = OAuthConfig::new("id", "secret")
        .with_token_url(token_url)
        .with_first_port(free_port())
        .with_callback_timeout(Duration::from_secs(10));
    let authenticator = Authenticator::new(config, store.clone());

    let client = authenticator
        .get_authenticated_client_with(|auth_url| {
            // Stand in for the user granting consent in the browser.
            let (redirect_uri, state) = consent_url_parts(auth_url);
            let callback = redirect_uri.replace("localhost", "127.0.0.1");
            tokio::spawn(async move {
                reqwest::get(format!("{callback}?code=fake-code&state={state}"))
                    .await
                    .unwrap();
            });
            Ok(())
        })
        .await
        .unwrap();

    let credentials = client.credentials().unwrap().clone();
    assert_eq!(credentials.access_token, "stub-access");
    assert_eq!(credentials.refresh_token.as_deref(), Some("stub-refresh"));

    // A fresh load produces a client equivalent to the one returned.
    let reloaded = store.load().expect("record persisted");
    assert_eq!(reloaded, credentials);
}

#[tokio::test]
async fn timeout_fails_the_session_and_releases_the_port() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::with_path(dir.path().join("token.json"));
    let port = free_port();

    let config = OAuthConfig::new("id", "secret")
        .with_first_port(port)
        .with_callback_timeout(Duration::from_millis(300));
    let authenticator = Authenticator::new(config, store.clone());

    let err = authenticator
        .get_authenticated_client_with(|_| Ok(()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));

    // The listener must be gone: a fresh bind on its port succeeds.
    TcpListener::bind(("127.0.0.1", port)).unwrap();
    assert!(store.load().is_none());
}

#[tokio::test]
async fn state_mismatch_fails_without_persisting_anything() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::with_path(dir.path().join("token.json"));

    let config = OAuthConfig::new("id", "secret")
        .with_first_port(free_port())
        .with_callback_timeout(Duration::from_secs(10));
    let authenticator = Authenticator::new(config, store.clone());

    let err = authenticator
        .get_authenticated_client_with(|auth_url| {
            let (redirect_uri, _) = consent_url_parts(auth_url);
            let callback = redirect_uri.replace("localhost", "127.0.0.1");
            tokio::spawn(async move {
                reqwest::get(format!("{callback}?code=fake-code&state=forged"))
                    .await
                    .unwrap();
            });
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StateMismatch { .. }));
    assert!(store.load().is_none());
}

#[tokio::test]
async fn callback_without_state_fails_without_persisting_anything() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::with_path(dir.path().join("token.json"));

    let config = OAuthConfig::new("id", "secret")
        .with_first_port(free_port())
        .with_callback_timeout(Duration::from_secs(10));
    let authenticator = Authenticator::new(config, store.clone());

    let err = authenticator
        .get_authenticated_client_with(|auth_url| {
            let (redirect_uri, _) = consent_url_parts(auth_url);
            let callback = redirect_uri.replace("localhost", "127.0.0.1");
            tokio::spawn(async move {
                reqwest::get(format!("{callback}?code=forged-code"))
                    .await
                    .unwrap();
            });
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StateMismatch { .. }));
    assert!(store.load().is_none());
}
