//! Credentials and the authenticated transport.
//!
//! The session (cookies, auth state) is process-wide, single-instance, and
//! mutable. It is constructed once, shared behind `Arc<dyn Transport>`, and
//! only the rate-limited gateway talks to it directly. Passwords are held
//! behind `secrecy` and never logged.

use crate::error::{Result, SimError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

/// Login credentials, consumed once at client construction.
#[derive(Clone)]
pub struct Credentials {
    /// Account user name.
    pub username: String,
    password: SecretString,
}

impl Credentials {
    /// Creates credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Exposes the password for form submission.
    #[must_use]
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The opaque HTTP capability the core calls through.
///
/// Implementations carry the authenticated cookie state; they are not safe
/// for uncoordinated concurrent use, so all calls are funneled through the
/// gateway, which serializes them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET and returns the response body.
    async fn get(&self, url: &str) -> Result<String>;

    /// Issues a form POST and returns the response body.
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String>;
}

/// Reqwest-backed transport with a cookie store.
pub struct WebSession {
    http: reqwest::Client,
}

impl WebSession {
    /// Builds the HTTP client with a cookie jar and request timeout.
    ///
    /// # Errors
    /// Returns [`SimError::Network`] if the client cannot be constructed.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SimError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Posts the login form and establishes the session cookies.
    ///
    /// # Errors
    /// Returns [`SimError::AuthenticationFailed`] on a non-success status;
    /// transport failures during login are folded into the same kind since
    /// the client cannot come up without a session.
    pub async fn login(&self, login_url: &str, credentials: &Credentials) -> Result<()> {
        tracing::debug!(username = %credentials.username, "logging in");

        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password()),
        ];
        let response = self
            .http
            .post(login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SimError::AuthenticationFailed(e.to_string()))?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(SimError::AuthenticationFailed(format!(
                "login rejected with status {status}"
            )));
        }

        tracing::info!("session established");
        Ok(())
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(200).collect();
            return Err(SimError::api(status.as_u16(), excerpt));
        }
        Ok(response.text().await?)
    }
}

impl std::fmt::Debug for WebSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSession").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for WebSession {
    async fn get(&self, url: &str) -> Result<String> {
        tracing::debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        Self::read_body(response).await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String> {
        tracing::debug!("POST {}", url);
        let response = self.http.post(url).form(form).send().await?;
        Self::read_body(response).await
    }
}
