//! Authorization redirect construction. The `state` nonce is generated here and
//! must be echoed back by the provider on the callback.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use url::Url;

#[derive(Clone, Debug)]
pub struct AuthorizeConfig {
    pub authorize_url: Url,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
}

impl AuthorizeConfig {
    /// Builds the provider URL the user is sent to for a login attempt.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("state", state);
            if let Some(scope) = self.scope.as_deref().filter(|scope| !scope.trim().is_empty()) {
                query.append_pair("scope", scope.trim());
            }
        }
        url
    }
}

/// Create a random anti-forgery nonce for one login attempt.
///
/// # Errors
/// Fails when the OS random source is unavailable.
pub fn generate_state() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate login state")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scope: Option<&str>) -> AuthorizeConfig {
        AuthorizeConfig {
            authorize_url: Url::parse("https://id.example.test/oauth/authorize?prompt=login")
                .unwrap(),
            client_id: "mobile-app".to_string(),
            redirect_uri: "https://app.example.test/auth/callback".to_string(),
            scope: scope.map(str::to_string),
        }
    }

    #[test]
    fn authorization_url_keeps_existing_query_and_adds_params() {
        let url = config(Some("openid profile")).authorization_url("nonce-1");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("id.example.test"));
        assert!(pairs.contains(&("prompt".to_string(), "login".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("client_id".to_string(), "mobile-app".to_string())));
        assert!(pairs.contains(&("state".to_string(), "nonce-1".to_string())));
        assert!(pairs.contains(&("scope".to_string(), "openid profile".to_string())));
    }

    #[test]
    fn blank_scope_is_omitted() {
        let url = config(Some("  ")).authorization_url("n");
        assert!(url.query_pairs().all(|(key, _)| key != "scope"));
    }

    #[test]
    fn generated_states_are_unique_and_url_safe() {
        let first = generate_state().unwrap();
        let second = generate_state().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
