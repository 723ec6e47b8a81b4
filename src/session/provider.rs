//! Provider scope for a session. Mounting creates the store and starts
//! restoring a persisted session; views receive [`SessionHandle`]s and never
//! the store itself. Dropping the provider is the unmount: pending restoration
//! and exchanges are cancelled and subscribers are released.

use super::{
    callback::CallbackPayload,
    completer::LoginCompleter,
    error::AuthError,
    store::{SessionHandle, SessionStore},
    types::SessionStatus,
};
use crate::{
    identity::{AuthorizeConfig, IdentityBackend},
    persist::SessionRestorer,
};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub struct SessionProvider {
    store: Arc<SessionStore>,
    completer: LoginCompleter,
    restorer: Arc<dyn SessionRestorer>,
    authorize: Option<AuthorizeConfig>,
    cancel: CancellationToken,
    restoration: JoinHandle<()>,
}

impl SessionProvider {
    /// Mounts a provider scope. Status starts `Loading` and settles once the
    /// restorer answers. Must be called inside a tokio runtime.
    pub fn mount(backend: Arc<dyn IdentityBackend>, restorer: Arc<dyn SessionRestorer>) -> Self {
        let store = Arc::new(SessionStore::new());
        let cancel = CancellationToken::new();
        let completer = LoginCompleter::new(backend, Arc::clone(&store), cancel.child_token());

        let restoration = tokio::spawn(restore_session(
            Arc::clone(&store),
            Arc::clone(&restorer),
            cancel.child_token(),
        ));

        debug!("session provider mounted");
        Self {
            store,
            completer,
            restorer,
            authorize: None,
            cancel,
            restoration,
        }
    }

    /// Enables [`begin_login`](Self::begin_login) with the given provider settings.
    #[must_use]
    pub fn with_authorize(mut self, config: AuthorizeConfig) -> Self {
        self.authorize = Some(config);
        self
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.store.status()
    }

    /// Read-only view for descendants and gates.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.store.handle()
    }

    /// Starts a redirect login and returns the provider URL.
    ///
    /// # Errors
    /// Fails when no authorize settings were configured or no nonce can be
    /// generated.
    pub fn begin_login(&self) -> Result<Url> {
        let config = self
            .authorize
            .as_ref()
            .ok_or_else(|| anyhow!("login is not configured: missing authorize settings"))?;
        self.completer.begin_login(config)
    }

    /// Completes a redirect callback and resolves with the destination.
    ///
    /// Calling this while already authenticated does not contact the backend:
    /// the payload is still checked and its destination returned.
    ///
    /// # Errors
    /// See [`LoginCompleter::complete`].
    #[instrument(skip(self, payload))]
    pub async fn login(&self, payload: &CallbackPayload) -> Result<String, AuthError> {
        if self.store.status().is_authenticated() {
            self.completer.validate(payload)?;
            debug!("already authenticated, ignoring callback");
            return Ok(payload.resolved_destination());
        }

        let destination = self.completer.complete(payload).await?;

        if let Some(session) = self.store.status().session() {
            if let Err(err) = self.restorer.persist(session).await {
                warn!(error = %err, "failed to persist session");
            }
        }
        Ok(destination)
    }

    /// Ends the session and forgets any persisted copy.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.store.clear();
        if let Err(err) = self.restorer.forget().await {
            warn!(error = %err, "failed to forget persisted session");
        }
        info!("logged out");
    }

    /// Tears the scope down. Equivalent to dropping the provider.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.restoration.abort();
        self.store.close();
        debug!("session provider unmounted");
    }
}

async fn restore_session(
    store: Arc<SessionStore>,
    restorer: Arc<dyn SessionRestorer>,
    cancel: CancellationToken,
) {
    let restored = tokio::select! {
        () = cancel.cancelled() => return,
        restored = restorer.restore() => restored,
    };

    let session = match restored {
        Ok(Some(session)) if session.is_valid() => {
            debug!("restored persisted session");
            Some(session)
        }
        Ok(Some(_)) => {
            info!("persisted session expired");
            if let Err(err) = restorer.forget().await {
                warn!(error = %err, "failed to forget expired session");
            }
            None
        }
        Ok(None) => None,
        Err(err) => {
            // Restoration problems never block first load.
            warn!(error = %err, "failed to restore session");
            None
        }
    };

    if cancel.is_cancelled() || !store.settle(session) {
        debug!("restoration result discarded");
    }
}
