//! Access gate for protected views. The gate is a pure projection of the
//! current status: it keeps no state besides the login path and reacts only to
//! store transitions. Protected content is produced lazily so it is never built
//! for a status that does not allow it.

use super::{
    store::{SessionHandle, Subscription},
    types::{Session, SessionStatus},
};

/// Default unauthenticated entry point.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// What the gate decided, without the content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Preparing,
    Redirect(String),
    Allow,
}

/// What a protected view renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateView<T> {
    /// Neutral "preparing session" indicator.
    Preparing,
    /// Navigate to the unauthenticated entry point.
    Redirect(String),
    Content(T),
}

impl<T> GateView<T> {
    #[must_use]
    pub fn decision(&self) -> GateDecision {
        match self {
            Self::Preparing => GateDecision::Preparing,
            Self::Redirect(path) => GateDecision::Redirect(path.clone()),
            Self::Content(_) => GateDecision::Allow,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccessGate {
    login_path: String,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PATH)
    }
}

impl AccessGate {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn evaluate(&self, status: &SessionStatus) -> GateDecision {
        match status {
            SessionStatus::Loading => GateDecision::Preparing,
            SessionStatus::Unauthenticated => GateDecision::Redirect(self.login_path.clone()),
            SessionStatus::Authenticated(_) => GateDecision::Allow,
        }
    }

    /// Renders `status`; `content` runs only for an authenticated session.
    pub fn render<T, F>(&self, status: &SessionStatus, content: F) -> GateView<T>
    where
        F: FnOnce(&Session) -> T,
    {
        match status {
            SessionStatus::Loading => GateView::Preparing,
            SessionStatus::Unauthenticated => GateView::Redirect(self.login_path.clone()),
            SessionStatus::Authenticated(session) => GateView::Content(content(session)),
        }
    }

    /// Follows a provider scope: yields the view for the current status and
    /// then one view per transition until the scope is torn down.
    pub fn watch<F>(&self, handle: &SessionHandle, content: F) -> GateWatch<F> {
        let (current, subscription) = handle.snapshot_and_subscribe();
        GateWatch {
            gate: self.clone(),
            current: Some(current),
            subscription,
            content,
        }
    }
}

pub struct GateWatch<F> {
    gate: AccessGate,
    current: Option<SessionStatus>,
    subscription: Subscription,
    content: F,
}

impl<F> GateWatch<F> {
    /// Next view to render, or `None` once the provider has unmounted.
    pub async fn next<T>(&mut self) -> Option<GateView<T>>
    where
        F: FnMut(&Session) -> T,
    {
        let status = match self.current.take() {
            Some(status) => status,
            None => self.subscription.recv().await?,
        };
        let content = &mut self.content;
        Some(self.gate.render(&status, |session| content(session)))
    }
}
