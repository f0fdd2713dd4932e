use std::env;
use std::time::Duration;

use crate::Error;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/tasks";
const CALLBACK_PATH: &str = "/oauth2callback";

const DEFAULT_FIRST_PORT: u16 = 3000;
const DEFAULT_MAX_PORT_ATTEMPTS: u16 = 25;
const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the Google OAuth client and the callback listener.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    /// First port the callback listener tries to bind.
    pub first_port: u16,
    /// How many successive ports to probe before giving up.
    pub max_port_attempts: u16,
    /// How long to wait for the consent redirect before the session fails.
    pub callback_timeout: Duration,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            auth_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            first_port: DEFAULT_FIRST_PORT,
            max_port_attempts: DEFAULT_MAX_PORT_ATTEMPTS,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }

    /// Build a configuration from `GOOGLE_CLIENT_ID` and `GOOGLE_CLIENT_SECRET`.
    ///
    /// Missing or empty variables are a fatal precondition, not retried.
    pub fn from_env() -> Result<Self, Error> {
        let client_id = env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty());
        let client_secret = env::var("GOOGLE_CLIENT_SECRET")
            .ok()
            .filter(|v| !v.is_empty());
        Self::from_parts(client_id, client_secret)
    }

    pub(crate) fn from_parts(
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<Self, Error> {
        let client_id = client_id.ok_or(Error::Configuration("GOOGLE_CLIENT_ID"))?;
        let client_secret = client_secret.ok_or(Error::Configuration("GOOGLE_CLIENT_SECRET"))?;
        Ok(Self::new(client_id, client_secret))
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    #[must_use]
    pub fn with_first_port(mut self, port: u16) -> Self {
        self.first_port = port;
        self
    }

    #[must_use]
    pub fn with_max_port_attempts(mut self, attempts: u16) -> Self {
        self.max_port_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// The redirect URI registered with Google for a given callback port.
    ///
    /// Google matches loopback redirects on any port, so the port probed at
    /// runtime does not have to be pre-registered.
    pub fn redirect_uri(&self, port: u16) -> String {
        format!("http://localhost:{port}{CALLBACK_PATH}")
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

pub(crate) fn callback_path() -> &'static str {
    CALLBACK_PATH
}
