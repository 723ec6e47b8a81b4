//! Session lifecycle: the store, the redirect completer, the provider scope
//! and the access gate. Everything here must avoid logging session tokens or
//! callback codes.
//!
//! Flow Overview: the provider mounts with status `Loading` and asks the
//! restorer for a persisted session. A redirect callback is handed to
//! `SessionProvider::login`, which runs the single live exchange and commits
//! the session. Gates re-render on every store transition.

mod callback;
mod completer;
mod error;
mod gate;
mod provider;
mod store;
mod types;

pub use callback::{CallbackPayload, DEFAULT_DESTINATION};
pub use completer::LoginCompleter;
pub use error::{AuthError, BackendError, GENERIC_EXCHANGE_MESSAGE};
pub use gate::{AccessGate, GateDecision, GateView, GateWatch, DEFAULT_LOGIN_PATH};
pub use provider::SessionProvider;
pub use store::{ListenerGuard, SessionHandle, SessionStore, Subscription};
pub use types::{Identity, Session, SessionStatus};
