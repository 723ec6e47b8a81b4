//! Session commands. Each command mounts one provider scope, waits for the
//! persisted session to be checked, does its work and unmounts on return.

use crate::{
    cli::globals::GlobalArgs,
    session::{AuthError, CallbackPayload, GateView, Session, SessionProvider, SessionStatus},
};
use anyhow::{anyhow, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::{timeout, Duration},
};
use tracing::{debug, info};

const SETTLE_TIMEOUT_SECS: u64 = 10;

async fn settle(provider: &SessionProvider) -> Result<SessionStatus> {
    timeout(
        Duration::from_secs(SETTLE_TIMEOUT_SECS),
        provider.handle().settled(),
    )
    .await
    .context("timed out restoring session")?
    .ok_or_else(|| anyhow!("session provider unmounted"))
}

/// Complete a redirect URL through the provider and print the destination.
async fn complete(provider: &SessionProvider, redirect_url: &str) -> Result<()> {
    let result = match CallbackPayload::from_url(redirect_url.trim()) {
        Ok(payload) => provider.login(&payload).await,
        Err(err) => Err(err),
    };

    let destination = login_outcome(result)?;
    info!(destination = %destination, "signed in");
    println!("{destination}");
    Ok(())
}

/// Maps a login result to what the command reports. The error carries only the
/// user-facing message; `main` prints it once.
fn login_outcome(result: Result<String, AuthError>) -> Result<String> {
    result.map_err(|err| {
        debug!(error = %err, "login failed");
        anyhow!(err.user_message())
    })
}

fn describe(session: &Session) -> String {
    let identity = session.identity();
    let who = identity
        .display_name
        .as_deref()
        .or(identity.email.as_deref())
        .or(identity.subject.as_deref())
        .unwrap_or("unknown user");
    match session.expires_at() {
        Some(expires_at) => format!("authenticated as {who} (expires {})", expires_at.to_rfc3339()),
        None => format!("authenticated as {who}"),
    }
}

/// Interactive login: print the provider URL and complete the pasted redirect.
///
/// # Errors
/// Returns an error if the login cannot be started or completed.
pub async fn login(globals: &GlobalArgs) -> Result<()> {
    let provider = globals.mount_provider()?;
    if let SessionStatus::Authenticated(session) = settle(&provider).await? {
        println!("{}", describe(&session));
        return Ok(());
    }

    let url = provider.begin_login()?;
    println!("Open this URL to sign in:\n{url}");
    eprintln!("Paste the redirect URL:");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let redirect_url = lines
        .next_line()
        .await?
        .filter(|line| !line.trim().is_empty())
        .context("no redirect URL provided")?;

    complete(&provider, &redirect_url).await
}

/// Handle a redirect delivered by the platform (deep link or browser hand-off).
///
/// # Errors
/// Returns an error if the callback is invalid or the exchange fails.
pub async fn callback(globals: &GlobalArgs, redirect_url: &str) -> Result<()> {
    let provider = globals.mount_provider()?;
    let status = settle(&provider).await?;
    debug!(status = status.label(), "session settled before callback");
    complete(&provider, redirect_url).await
}

/// Print what a protected view would render for the current session.
///
/// # Errors
/// Returns an error if the provider cannot be mounted.
pub async fn status(globals: &GlobalArgs) -> Result<()> {
    let provider = globals.mount_provider()?;
    let status = settle(&provider).await?;

    match globals.gate().render(&status, describe) {
        GateView::Preparing => println!("preparing session"),
        GateView::Redirect(path) => println!("unauthenticated, redirect to {path}"),
        GateView::Content(text) => println!("{text}"),
    }
    Ok(())
}

/// End the session and remove the persisted copy.
///
/// # Errors
/// Returns an error if the provider cannot be mounted.
pub async fn logout(globals: &GlobalArgs) -> Result<()> {
    let provider = globals.mount_provider()?;
    settle(&provider).await?;
    provider.logout().await;
    println!("signed out");
    Ok(())
}
