//! Identity-provider side of the login flow: building the authorization
//! redirect and exchanging the returned code for a session.

pub mod authorize;
pub mod http;

use crate::session::{BackendError, CallbackPayload, Session};
use async_trait::async_trait;

pub use authorize::{generate_state, AuthorizeConfig};
pub use http::HttpIdentityBackend;

/// Exchanges a callback payload for a session. Implementations validate the
/// code server-side; codes are single-use.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn exchange_callback(&self, payload: &CallbackPayload) -> Result<Session, BackendError>;
}
