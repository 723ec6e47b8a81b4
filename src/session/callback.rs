//! Redirect callback payload and destination handling. Providers may return
//! parameters in the query string or in the fragment; fragment values win when
//! both are present.

use super::error::AuthError;
use secrecy::{ExposeSecret, SecretString};
use std::{borrow::Cow, fmt};
use tracing::warn;
use url::{form_urlencoded, Url};

/// Path used when the callback carries no usable destination hint.
pub const DEFAULT_DESTINATION: &str = "/";

/// Parameter names accepted as a destination hint, in priority order.
const DESTINATION_KEYS: [&str; 3] = ["next", "redirect_to", "destination"];

#[derive(Clone, Default)]
pub struct CallbackPayload {
    pub code: Option<SecretString>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub state: Option<String>,
    pub destination: Option<String>,
}

impl CallbackPayload {
    /// Payload carrying only a completion code.
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(SecretString::from(code.into())),
            ..Self::default()
        }
    }

    /// Payload carrying only a provider error indicator.
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Parses the payload from the full redirect URL.
    ///
    /// # Errors
    /// Returns `InvalidCallback` when the URL cannot be parsed.
    pub fn from_url(redirect: &str) -> Result<Self, AuthError> {
        let url = Url::parse(redirect)
            .map_err(|err| AuthError::InvalidCallback(format!("unparsable redirect URL: {err}")))?;

        let mut payload = Self::default();
        payload.absorb(url.query_pairs());
        if let Some(fragment) = url.fragment() {
            payload.absorb(form_urlencoded::parse(fragment.as_bytes()));
        }
        Ok(payload)
    }

    fn absorb<'a>(&mut self, pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) {
        let mut destination: Option<(usize, String)> = None;
        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                // Implicit-grant providers return the credential as `access_token`.
                "code" | "access_token" => self.code = Some(SecretString::from(value.to_string())),
                "error" => self.error = Some(value.to_string()),
                "error_description" => self.error_description = Some(value.to_string()),
                "state" => self.state = Some(value.to_string()),
                other => {
                    if let Some(rank) = DESTINATION_KEYS.iter().position(|key| *key == other) {
                        if destination.as_ref().map_or(true, |(best, _)| rank <= *best) {
                            destination = Some((rank, value.to_string()));
                        }
                    }
                }
            }
        }
        if let Some((_, value)) = destination {
            self.destination = Some(value);
        }
    }

    /// The code, if present and not blank.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code
            .as_ref()
            .map(|code| code.expose_secret().trim())
            .filter(|code| !code.is_empty())
    }

    /// Provider error message: the description when present, else the error code.
    #[must_use]
    pub fn provider_error(&self) -> Option<String> {
        let error = self.error.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
        Some(
            self.error_description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(error)
                .to_string(),
        )
    }

    /// Destination to navigate to after a successful login.
    #[must_use]
    pub fn resolved_destination(&self) -> String {
        match self.destination.as_deref() {
            Some(hint) if is_local_path(hint) => hint.to_string(),
            Some(hint) => {
                warn!(destination = hint, "ignoring non-local destination hint");
                DEFAULT_DESTINATION.to_string()
            }
            None => DEFAULT_DESTINATION.to_string(),
        }
    }
}

impl fmt::Debug for CallbackPayload {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CallbackPayload")
            .field("code", &self.code.as_ref().map(|_| "[REDACTED]"))
            .field("error", &self.error)
            .field("error_description", &self.error_description)
            .field("state", &self.state)
            .field("destination", &self.destination)
            .finish()
    }
}

/// Accepts only same-origin absolute paths.
fn is_local_path(hint: &str) -> bool {
    hint.starts_with('/')
        && !hint.starts_with("//")
        && !hint.contains('\\')
        && !hint.chars().any(char::is_control)
}
