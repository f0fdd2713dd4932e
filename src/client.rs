use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::Deserialize;
use url::Url;

use crate::{CredentialRecord, Error, OAuthConfig};

const STATE_BYTES: usize = 32;

/// A consent URL plus the `state` value embedded in it.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub state: String,
}

/// What Google's token endpoint returns on exchange and refresh.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    expires_in: Option<u64>,
}

/// OAuth client bound to one redirect port.
///
/// Capable of generating a consent URL, exchanging an authorization code for
/// tokens, refreshing them, and holding the current credentials.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    redirect_uri: String,
    http: reqwest::Client,
    credentials: Option<CredentialRecord>,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfig, port: u16) -> Self {
        let redirect_uri = config.redirect_uri(port);
        Self {
            config: config.clone(),
            redirect_uri,
            http: reqwest::Client::new(),
            credentials: None,
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn set_credentials(&mut self, record: CredentialRecord) {
        self.credentials = Some(record);
    }

    pub fn credentials(&self) -> Option<&CredentialRecord> {
        self.credentials.as_ref()
    }

    /// Build the consent URL with a freshly generated `state`.
    ///
    /// Requests offline access and forces the consent screen so Google issues
    /// a refresh token even on repeat authorizations.
    pub fn authorization_url(&self) -> Result<AuthorizationRequest, Error> {
        self.authorization_url_with_state(random_state()?)
    }

    pub fn authorization_url_with_state(
        &self,
        state: String,
    ) -> Result<AuthorizationRequest, Error> {
        let mut url = Url::parse(&self.config.auth_url)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("response_type", "code");
            pairs.append_pair("client_id", &self.config.client_id);
            pairs.append_pair("redirect_uri", &self.redirect_uri);
            pairs.append_pair("scope", &self.config.scope());
            pairs.append_pair("access_type", "offline");
            pairs.append_pair("prompt", "consent");
            pairs.append_pair("state", &state);
        }

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            state,
        })
    }

    /// Exchange an authorization code for tokens and install them.
    pub async fn exchange_code(&mut self, code: &str) -> Result<CredentialRecord, Error> {
        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "authorization_code".to_string());
        payload.insert("code".to_string(), code.to_string());
        payload.insert("client_id".to_string(), self.config.client_id.clone());
        payload.insert(
            "client_secret".to_string(),
            self.config.client_secret.clone(),
        );
        payload.insert("redirect_uri".to_string(), self.redirect_uri.clone());

        let response = self.send_token_request(payload).await?;
        let record = CredentialRecord::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            response.scope,
        );
        let record = with_token_type(record, response.token_type);
        self.credentials = Some(record.clone());
        Ok(record)
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// Google omits the refresh token (and sometimes the scope) from refresh
    /// responses, so the prior values carry over.
    pub async fn refresh(&mut self) -> Result<CredentialRecord, Error> {
        let current = self.credentials.as_ref().ok_or(Error::NotAuthenticated)?;
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or(Error::NotAuthenticated)?;
        let prior_scope = current.scope.clone();

        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "refresh_token".to_string());
        payload.insert("refresh_token".to_string(), refresh_token.clone());
        payload.insert("client_id".to_string(), self.config.client_id.clone());
        payload.insert(
            "client_secret".to_string(),
            self.config.client_secret.clone(),
        );

        let response = self.send_token_request(payload).await?;
        let record = CredentialRecord::new(
            response.access_token,
            response.refresh_token.or(Some(refresh_token)),
            response.expires_in,
            response.scope.or(prior_scope),
        );
        let record = with_token_type(record, response.token_type);
        self.credentials = Some(record.clone());
        Ok(record)
    }

    async fn send_token_request(
        &self,
        payload: HashMap<String, String>,
    ) -> Result<TokenResponse, Error> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| Error::InvalidResponse(err.to_string()))
    }
}

fn with_token_type(mut record: CredentialRecord, token_type: Option<String>) -> CredentialRecord {
    if let Some(token_type) = token_type {
        record.token_type = token_type;
    }
    record
}

/// Random URL-safe `state` value for CSRF protection of the redirect.
pub(crate) fn random_state() -> Result<String, Error> {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| Error::OsRng {
            message: err.to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig::new("client-id", "client-secret")
    }

    #[test]
    fn authorization_url_includes_required_params() {
        let client = OAuthClient::new(&config(), 3000);
        let auth = client.authorization_url().unwrap();

        let url = Url::parse(&auth.authorization_url).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs.get("response_type"), Some(&"code".to_string()));
        assert_eq!(pairs.get("client_id"), Some(&"client-id".to_string()));
        assert_eq!(
            pairs.get("redirect_uri"),
            Some(&"http://localhost:3000/oauth2callback".to_string())
        );
        assert_eq!(
            pairs.get("scope"),
            Some(&"https://www.googleapis.com/auth/tasks".to_string())
        );
        assert_eq!(pairs.get("access_type"), Some(&"offline".to_string()));
        assert_eq!(pairs.get("prompt"), Some(&"consent".to_string()));
        assert_eq!(pairs.get("state"), Some(&auth.state));
    }

    #[test]
    fn redirect_uri_follows_the_bound_port() {
        let client = OAuthClient::new(&config(), 3107);
        let auth = client.authorization_url().unwrap();

        let url = Url::parse(&auth.authorization_url).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs.get("redirect_uri"),
            Some(&"http://localhost:3107/oauth2callback".to_string())
        );
    }

    #[test]
    fn generated_state_is_url_safe() {
        let state = random_state().unwrap();
        assert!(!state.contains('='));
        assert!(!state.contains('+'));
        assert!(!state.contains('/'));
    }

    #[test]
    fn refresh_without_credentials_is_not_authenticated() {
        let mut client = OAuthClient::new(&config(), 3000);
        let err = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(client.refresh())
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }
}
