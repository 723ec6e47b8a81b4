//! Client-side authentication session manager.
//!
//! A [`SessionProvider`](session::SessionProvider) owns one
//! [`SessionStore`](session::SessionStore), restores a persisted session on
//! mount, completes redirect callbacks through a
//! [`LoginCompleter`](session::LoginCompleter) and hands read-only
//! [`SessionHandle`](session::SessionHandle)s to views, which compose them with
//! an [`AccessGate`](session::AccessGate).

pub mod cli;
pub mod identity;
pub mod persist;
pub mod session;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
