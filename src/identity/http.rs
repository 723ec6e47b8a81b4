//! HTTP identity backend. Posts the callback code to the provider token
//! endpoint and maps the JSON response into a [`Session`]. The code and the
//! returned credential are never logged.

use super::IdentityBackend;
use crate::{
    session::{BackendError, CallbackPayload, Identity, Session},
    APP_USER_AGENT,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration as StdDuration;
use tracing::{debug, instrument};
use url::Url;

const TOKEN_PATH: &str = "/v1/auth/token";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    subject: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let mut session = Session::new(self.access_token).with_identity(Identity {
            subject: self.subject,
            display_name: self.name,
            email: self.email,
        });
        let expires_at = self
            .expires_in
            .filter(|seconds| *seconds > 0)
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        if let Some(expires_at) = expires_at {
            session = session.with_expiry(expires_at);
        }
        session
    }
}

#[derive(Clone, Debug)]
pub struct HttpIdentityBackend {
    client: Client,
    token_url: Url,
    client_id: String,
    redirect_uri: String,
}

impl HttpIdentityBackend {
    /// Builds a backend against `identity_url`, which may carry a path prefix.
    ///
    /// # Errors
    /// Fails when the URL is not http(s) or the HTTP client cannot be built.
    pub fn new(identity_url: &str, client_id: &str, redirect_uri: &str) -> Result<Self> {
        let token_url = endpoint_url(identity_url, TOKEN_PATH)?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            token_url,
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
        })
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    #[instrument(skip(self, payload), fields(token_url = %self.token_url))]
    async fn exchange_callback(&self, payload: &CallbackPayload) -> Result<Session, BackendError> {
        let code = payload
            .code()
            .ok_or_else(|| BackendError::Rejected("missing code".to_string()))?;

        let body = json!({
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": self.redirect_uri,
            "client_id": self.client_id,
        });

        let response = self
            .client
            .post(self.token_url.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|value| error_message(&value))
                .unwrap_or_else(|| format!("identity backend returned {status}"));
            debug!(%status, "token exchange rejected");
            return Err(BackendError::Rejected(message));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;
        if token.access_token.trim().is_empty() {
            return Err(BackendError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }

        debug!("token exchange succeeded");
        Ok(token.into_session())
    }
}

fn error_message(value: &Value) -> Option<String> {
    ["error_description", "message", "error"]
        .iter()
        .find_map(|key| value[*key].as_str())
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// Joins `endpoint` onto the base URL, keeping any path prefix.
fn endpoint_url(base: &str, endpoint: &str) -> Result<Url> {
    let url = Url::parse(base)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}")),
    }
    if url.host().is_none() {
        return Err(anyhow!("Error parsing URL: no host specified"));
    }

    let prefix = url.path().trim_end_matches('/');
    let mut endpoint_url = url.clone();
    endpoint_url.set_path(&format!("{prefix}{endpoint}"));
    endpoint_url.set_query(None);
    endpoint_url.set_fragment(None);
    Ok(endpoint_url)
}
