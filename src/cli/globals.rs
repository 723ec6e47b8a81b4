use crate::{
    cli::commands::identity::Options,
    identity::{AuthorizeConfig, HttpIdentityBackend},
    persist::FileSessionRestorer,
    session::{AccessGate, SessionProvider},
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};
use url::Url;

const AUTHORIZE_PATH: &str = "v1/auth/authorize";

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub identity_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_url: Option<String>,
    pub scope: Option<String>,
    pub session_file: PathBuf,
    pub login_path: String,
}

impl From<Options> for GlobalArgs {
    fn from(options: Options) -> Self {
        Self {
            identity_url: options.identity_url,
            client_id: options.client_id,
            redirect_uri: options.redirect_uri,
            authorize_url: options.authorize_url,
            scope: options.scope,
            session_file: options.session_file,
            login_path: options.login_path,
        }
    }
}

impl GlobalArgs {
    /// Provider authorization settings; the URL defaults to a path under the identity URL.
    ///
    /// # Errors
    /// Returns an error if the configured URLs cannot be parsed.
    pub fn authorize_config(&self) -> Result<AuthorizeConfig> {
        let authorize_url = match &self.authorize_url {
            Some(url) => Url::parse(url).context("invalid --authorize-url")?,
            None => {
                let base = format!("{}/", self.identity_url.trim_end_matches('/'));
                Url::parse(&base)
                    .and_then(|base| base.join(AUTHORIZE_PATH))
                    .context("invalid --identity-url")?
            }
        };

        Ok(AuthorizeConfig {
            authorize_url,
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
        })
    }

    /// Mount a provider scope wired to the HTTP backend and the session file.
    ///
    /// # Errors
    /// Returns an error if the backend or authorize settings are invalid.
    pub fn mount_provider(&self) -> Result<SessionProvider> {
        let backend =
            HttpIdentityBackend::new(&self.identity_url, &self.client_id, &self.redirect_uri)
                .context("invalid identity backend settings")?;
        let restorer = FileSessionRestorer::new(self.session_file.clone());

        Ok(SessionProvider::mount(Arc::new(backend), Arc::new(restorer))
            .with_authorize(self.authorize_config()?))
    }

    #[must_use]
    pub fn gate(&self) -> AccessGate {
        AccessGate::new(self.login_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> GlobalArgs {
        GlobalArgs {
            identity_url: "https://id.example.test/tenant/".to_string(),
            client_id: "admin-web".to_string(),
            redirect_uri: "https://app.example.test/auth/callback".to_string(),
            authorize_url: None,
            scope: None,
            session_file: PathBuf::from("session.json"),
            login_path: "/login".to_string(),
        }
    }

    #[test]
    fn authorize_url_defaults_under_identity_url() {
        let config = globals().authorize_config().unwrap();
        assert_eq!(
            config.authorize_url.as_str(),
            "https://id.example.test/tenant/v1/auth/authorize"
        );
        assert_eq!(config.client_id, "admin-web");
    }

    #[test]
    fn explicit_authorize_url_wins() {
        let mut globals = globals();
        globals.authorize_url = Some("https://login.example.test/oauth2/auth".to_string());
        let config = globals.authorize_config().unwrap();
        assert_eq!(
            config.authorize_url.as_str(),
            "https://login.example.test/oauth2/auth"
        );
    }

    #[test]
    fn invalid_identity_url_is_rejected() {
        let mut globals = globals();
        globals.identity_url = "not a url".to_string();
        assert!(globals.authorize_config().is_err());
    }

    #[test]
    fn gate_uses_login_path() {
        let mut globals = globals();
        globals.login_path = "/signin".to_string();
        assert_eq!(globals.gate().login_path(), "/signin");
    }
}
