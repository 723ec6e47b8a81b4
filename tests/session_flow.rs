//! End-to-end session flows against a mocked identity backend.
//!
//! Each test mounts a real provider with the HTTP backend and the file
//! restorer, drives the redirect callback and checks what a gated view sees.

use anyhow::{bail, Result};
use authgate::{
    identity::HttpIdentityBackend,
    persist::{FileSessionRestorer, NoopRestorer, SessionRestorer},
    session::{
        AccessGate, AuthError, CallbackPayload, GateView, Session, SessionProvider,
        SessionStatus, DEFAULT_LOGIN_PATH,
    },
};
use secrecy::ExposeSecret;
use serde_json::json;
use std::{net::TcpListener, sync::Arc};
use tokio::time::{timeout, Duration};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REDIRECT_URI: &str = "https://app.example.test/auth/callback";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

async fn settled(provider: &SessionProvider) -> Result<SessionStatus> {
    match timeout(Duration::from_secs(5), provider.handle().settled()).await? {
        Some(status) => Ok(status),
        None => bail!("provider unmounted before settling"),
    }
}

async fn mock_exchange(server: &MockServer, code: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/token"))
        .and(body_partial_json(json!({ "code": code })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": 3600,
            "name": "Ada",
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "code already used",
        })))
        .mount(server)
        .await;
}

fn backend(server: &MockServer) -> Result<Arc<HttpIdentityBackend>> {
    Ok(Arc::new(HttpIdentityBackend::new(
        &server.uri(),
        "admin-web",
        REDIRECT_URI,
    )?))
}

fn dashboard(session: &Session) -> String {
    format!("dashboard:{}", session.token().expose_secret())
}

#[tokio::test]
async fn fresh_load_without_persisted_session_redirects() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let provider = SessionProvider::mount(backend(&server)?, Arc::new(NoopRestorer));
    let gate = AccessGate::default();
    let mut watch = gate.watch(&provider.handle(), dashboard);

    let first = watch.next().await;
    let redirect = GateView::Redirect(DEFAULT_LOGIN_PATH.to_string());
    if first != Some(GateView::Preparing) && first != Some(redirect) {
        bail!("unexpected first view: {first:?}");
    }
    assert_eq!(settled(&provider).await?, SessionStatus::Unauthenticated);
    assert_eq!(
        gate.render(&provider.status(), dashboard),
        GateView::Redirect(DEFAULT_LOGIN_PATH.to_string())
    );
    Ok(())
}

#[tokio::test]
async fn redirect_with_code_authenticates_and_persists() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mock_exchange(&server, "abc123", "tok_xyz").await;

    let dir = tempfile::tempdir()?;
    let session_file = dir.path().join("session.json");
    let provider = SessionProvider::mount(
        backend(&server)?,
        Arc::new(FileSessionRestorer::new(&session_file)),
    );
    assert_eq!(settled(&provider).await?, SessionStatus::Unauthenticated);

    let payload = CallbackPayload::from_url(&format!("{REDIRECT_URI}?code=abc123"))?;
    let destination = provider.login(&payload).await?;

    assert_eq!(destination, "/");
    let Some(session) = provider.status().session().cloned() else {
        bail!("expected an authenticated session");
    };
    assert_eq!(session.token().expose_secret(), "tok_xyz");
    assert_eq!(session.identity().display_name.as_deref(), Some("Ada"));
    assert_eq!(
        AccessGate::default().render(&provider.status(), dashboard),
        GateView::Content("dashboard:tok_xyz".to_string())
    );

    // A new scope restores the persisted session without another exchange.
    provider.unmount();
    let remounted = SessionProvider::mount(
        backend(&server)?,
        Arc::new(FileSessionRestorer::new(&session_file)),
    );
    assert_eq!(settled(&remounted).await?, SessionStatus::Authenticated(session));
    Ok(())
}

#[tokio::test]
async fn provider_error_keeps_status_loading() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let gate = Arc::new(tokio::sync::Notify::new());
    let restorer = Arc::new(BlockedRestorer(Arc::clone(&gate)));
    let provider = SessionProvider::mount(backend(&server)?, restorer);

    let payload = CallbackPayload::from_url(&format!("{REDIRECT_URI}?error=access_denied"))?;
    let result = provider.login(&payload).await;

    assert_eq!(result, Err(AuthError::Exchange("access_denied".to_string())));
    assert_eq!(provider.status(), SessionStatus::Loading);
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
    gate.notify_one();
    Ok(())
}

#[tokio::test]
async fn replayed_callback_fails_cleanly() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mock_exchange(&server, "abc123", "tok_xyz").await;

    let provider = SessionProvider::mount(backend(&server)?, Arc::new(NoopRestorer));
    settled(&provider).await?;

    let payload = CallbackPayload::from_url(&format!("{REDIRECT_URI}?code=abc123&next=/imports"))?;
    assert_eq!(provider.login(&payload).await?, "/imports");

    provider.logout().await;
    let replay = provider.login(&payload).await;
    assert!(
        matches!(replay, Err(AuthError::InvalidCallback(_))),
        "unexpected replay result: {replay:?}"
    );
    assert_eq!(provider.status(), SessionStatus::Unauthenticated);
    Ok(())
}

#[tokio::test]
async fn backend_rejection_is_reported_to_the_user() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mock_exchange(&server, "other-code", "tok").await;

    let provider = SessionProvider::mount(backend(&server)?, Arc::new(NoopRestorer));
    settled(&provider).await?;

    let result = provider.login(&CallbackPayload::with_code("stale")).await;
    let Err(err) = result else {
        bail!("expected an error");
    };
    assert_eq!(err.user_message(), "code already used");
    assert_eq!(provider.status(), SessionStatus::Unauthenticated);
    Ok(())
}

/// Restorer that never answers until released, keeping the scope `Loading`.
struct BlockedRestorer(Arc<tokio::sync::Notify>);

#[async_trait::async_trait]
impl SessionRestorer for BlockedRestorer {
    async fn restore(&self) -> Result<Option<Session>> {
        self.0.notified().await;
        Ok(None)
    }
}
