//! Orchestrates the two authentication paths: cached credentials and the
//! interactive consent flow.

use crate::listener::CallbackListener;
use crate::{CredentialRecord, Error, OAuthClient, OAuthConfig, TokenStore};

/// Public entry point for obtaining a ready-to-use client.
#[derive(Debug, Clone)]
pub struct Authenticator {
    config: OAuthConfig,
    store: TokenStore,
}

impl Authenticator {
    pub fn new(config: OAuthConfig, store: TokenStore) -> Self {
        Self { config, store }
    }

    /// Configuration from the environment, token store at `token.json`.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(OAuthConfig::from_env()?, TokenStore::new()))
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Return a client holding valid credentials, opening the consent screen
    /// in the default browser when no stored record exists.
    pub async fn get_authenticated_client(&self) -> Result<AuthorizedClient, Error> {
        self.get_authenticated_client_with(|url| {
            if let Err(err) = webbrowser::open(url) {
                tracing::warn!(error = %err, "could not open browser, visit the consent URL manually");
                eprintln!("Authorize this app by visiting:\n{url}");
            }
            Ok(())
        })
        .await
    }

    /// Like [`get_authenticated_client`](Self::get_authenticated_client), but
    /// with an injected consent-URL handler. The handler runs once the
    /// listener is bound and the URL reflects the probed port.
    pub async fn get_authenticated_client_with<F>(
        &self,
        on_authorize: F,
    ) -> Result<AuthorizedClient, Error>
    where
        F: FnOnce(&str) -> Result<(), Error>,
    {
        if let Some(record) = self.store.load() {
            tracing::debug!("using stored credentials");
            let mut client = OAuthClient::new(&self.config, self.config.first_port);
            client.set_credentials(record);
            return Ok(AuthorizedClient::new(client, self.store.clone()));
        }

        let mut listener =
            CallbackListener::start(self.config.first_port, self.config.max_port_attempts)?;

        // The listener must not outlive the session, whatever the outcome.
        let result = self.run_interactive(&mut listener, on_authorize).await;
        listener.shutdown().await;

        let client = result?;
        Ok(AuthorizedClient::new(client, self.store.clone()))
    }

    async fn run_interactive<F>(
        &self,
        listener: &mut CallbackListener,
        on_authorize: F,
    ) -> Result<OAuthClient, Error>
    where
        F: FnOnce(&str) -> Result<(), Error>,
    {
        let mut client = OAuthClient::new(&self.config, listener.port());
        let auth = client.authorization_url()?;

        tracing::info!(port = listener.port(), "awaiting consent redirect");
        on_authorize(&auth.authorization_url)?;

        let callback = listener.wait_for_code(self.config.callback_timeout).await?;

        // The consent URL always carries a state, so the redirect must echo
        // it back; a callback without one is as forged as a wrong one.
        let received = callback.state.unwrap_or_default();
        if received != auth.state {
            return Err(Error::StateMismatch {
                expected: auth.state,
                received,
            });
        }

        let record = client.exchange_code(&callback.code).await?;
        self.store.save(&record)?;
        tracing::info!("authentication complete, credentials persisted");
        Ok(client)
    }

    /// Remove the stored credentials. Succeeds when none exist.
    pub fn sign_out(&self) -> Result<(), Error> {
        self.store.clear()?;
        tracing::info!("signed out, stored credentials removed");
        Ok(())
    }
}

/// An OAuth client paired with the store that keeps its credentials fresh.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    client: OAuthClient,
    store: TokenStore,
}

impl AuthorizedClient {
    fn new(client: OAuthClient, store: TokenStore) -> Self {
        Self { client, store }
    }

    pub fn credentials(&self) -> Option<&CredentialRecord> {
        self.client.credentials()
    }

    /// Access token for signing an outbound request.
    ///
    /// Refreshes proactively when the stored token is expired (60 second
    /// leeway) and a refresh token exists, persisting the refreshed record.
    pub async fn bearer_token(&mut self) -> Result<String, Error> {
        let record = self.client.credentials().ok_or(Error::NotAuthenticated)?;

        if record.is_expired() {
            if record.refresh_token.is_none() {
                return Err(Error::NotAuthenticated);
            }
            tracing::debug!("access token expired, refreshing");
            let refreshed = self.client.refresh().await?;
            self.store.save(&refreshed)?;
            return Ok(refreshed.access_token);
        }

        Ok(record.access_token.clone())
    }
}
