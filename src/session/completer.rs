//! One-shot completion of the redirect login. Turns a callback payload into a
//! committed session or a definitive error, never both.
//!
//! Only one exchange may be live at a time; a second attempt is rejected
//! rather than racing the first to commit. Codes are remembered once they have
//! been sent to the backend so a replayed callback fails without another
//! exchange. A result that arrives after cancellation is dropped.

use super::{callback::CallbackPayload, error::AuthError, store::SessionStore};
use crate::identity::{generate_state, AuthorizeConfig, IdentityBackend};
use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use ulid::Ulid;
use url::Url;

/// How many used codes are remembered before the oldest is forgotten.
const CONSUMED_CODES_CAP: usize = 64;

/// Bounded record of codes already sent to the backend.
#[derive(Debug, Default)]
struct ConsumedCodes {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl ConsumedCodes {
    fn contains(&self, code: &str) -> bool {
        self.seen.contains(code)
    }

    /// Returns false if the code was already recorded.
    fn insert(&mut self, code: &str) -> bool {
        if !self.seen.insert(code.to_string()) {
            return false;
        }
        self.order.push_back(code.to_string());
        while self.order.len() > CONSUMED_CODES_CAP {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

pub struct LoginCompleter {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<SessionStore>,
    cancel: CancellationToken,
    live: tokio::sync::Mutex<()>,
    consumed: Mutex<ConsumedCodes>,
    pending_state: Mutex<Option<String>>,
}

impl LoginCompleter {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<SessionStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            store,
            cancel,
            live: tokio::sync::Mutex::new(()),
            consumed: Mutex::new(ConsumedCodes::default()),
            pending_state: Mutex::new(None),
        }
    }

    /// Starts a login attempt: remembers a fresh state nonce and returns the
    /// provider URL to send the user to. A newer attempt replaces an older one.
    ///
    /// # Errors
    /// Fails when no random nonce can be generated.
    pub fn begin_login(&self, config: &AuthorizeConfig) -> anyhow::Result<Url> {
        let state = generate_state()?;
        let url = config.authorization_url(&state);
        *self
            .pending_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(state);
        debug!("login attempt started");
        Ok(url)
    }

    /// True while an exchange is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.live.try_lock().is_err()
    }

    /// Completes the redirect and resolves with the destination path.
    ///
    /// # Errors
    /// `Exchange` for provider or backend failures, `InvalidCallback` for
    /// malformed, forged or replayed payloads, `LoginInProgress` when another
    /// exchange is live and `Cancelled` when the owner was torn down. The
    /// store is never touched on error.
    #[instrument(skip(self, payload), fields(attempt = %Ulid::new()))]
    pub async fn complete(&self, payload: &CallbackPayload) -> Result<String, AuthError> {
        let Ok(_live) = self.live.try_lock() else {
            warn!("rejecting login while another exchange is in flight");
            return Err(AuthError::LoginInProgress);
        };

        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        if payload.provider_error().is_some() {
            self.take_pending_state();
        }
        let code = self.validate(payload)?;

        self.verify_state(payload)?;

        if !self.consume(code) {
            warn!("callback code was already used");
            return Err(AuthError::InvalidCallback("code already used".to_string()));
        }

        let session = self.backend.exchange_callback(payload).await.map_err(|err| {
            warn!(error = %err, "identity exchange failed");
            AuthError::from(err)
        })?;

        if !session.is_valid() {
            return Err(AuthError::exchange(
                "identity backend returned an unusable session",
            ));
        }

        // The owner may have gone away while the exchange was in flight.
        if self.cancel.is_cancelled() || !self.store.set_authenticated(session) {
            debug!("discarding exchange result after cancellation");
            return Err(AuthError::Cancelled);
        }

        let destination = payload.resolved_destination();
        info!(destination = %destination, "login completed");
        Ok(destination)
    }

    /// Checks a payload without contacting the backend or consuming its code.
    /// Returns the code on success.
    ///
    /// # Errors
    /// `Exchange` when the provider reported an error, `InvalidCallback` when
    /// the code is missing or was already used.
    pub fn validate<'a>(&self, payload: &'a CallbackPayload) -> Result<&'a str, AuthError> {
        if let Some(message) = payload.provider_error() {
            info!(error = %message, "provider reported a login error");
            return Err(AuthError::exchange(message));
        }

        let Some(code) = payload.code() else {
            return Err(AuthError::InvalidCallback("missing code".to_string()));
        };

        let used = self
            .consumed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(code);
        if used {
            warn!("callback code was already used");
            return Err(AuthError::InvalidCallback("code already used".to_string()));
        }
        Ok(code)
    }

    fn take_pending_state(&self) -> Option<String> {
        self.pending_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn verify_state(&self, payload: &CallbackPayload) -> Result<(), AuthError> {
        let Some(expected) = self.take_pending_state() else {
            return Ok(());
        };
        match payload.state.as_deref() {
            Some(state) if state == expected => Ok(()),
            Some(_) => Err(AuthError::InvalidCallback("state mismatch".to_string())),
            None => Err(AuthError::InvalidCallback("missing state".to_string())),
        }
    }

    /// Marks the code as used. Returns false if it already was.
    fn consume(&self, code: &str) -> bool {
        self.consumed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code)
    }
}
