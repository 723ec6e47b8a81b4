use crate::cli::actions::{session, Action};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(globals) => session::login(&globals).await,
        Action::Callback {
            globals,
            redirect_url,
        } => session::callback(&globals, &redirect_url).await,
        Action::Status(globals) => session::status(&globals).await,
        Action::Logout(globals) => session::logout(&globals).await,
    }
}
