use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_CLIENT_ID: &str = "client-id";
pub const ARG_REDIRECT_URI: &str = "redirect-uri";
pub const ARG_AUTHORIZE_URL: &str = "authorize-url";
pub const ARG_SCOPE: &str = "scope";
pub const ARG_SESSION_FILE: &str = "session-file";
pub const ARG_LOGIN_PATH: &str = "login-path";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Identity backend base URL, example: https://id.example.com")
                .env("AUTHGATE_IDENTITY_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("Client id registered with the identity provider")
                .env("AUTHGATE_CLIENT_ID")
                .global(true),
        )
        .arg(
            Arg::new(ARG_REDIRECT_URI)
                .long(ARG_REDIRECT_URI)
                .help("Redirect URI the provider sends the user back to")
                .env("AUTHGATE_REDIRECT_URI")
                .global(true),
        )
        .arg(
            Arg::new(ARG_AUTHORIZE_URL)
                .long(ARG_AUTHORIZE_URL)
                .help("Provider authorization URL, defaults to <identity-url>/v1/auth/authorize")
                .env("AUTHGATE_AUTHORIZE_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_SCOPE)
                .long(ARG_SCOPE)
                .help("Space separated scopes requested at login")
                .env("AUTHGATE_SCOPE")
                .global(true),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("File holding the persisted session")
                .env("AUTHGATE_SESSION_FILE")
                .global(true)
                .default_value(".authgate/session.json")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Unauthenticated entry point protected views redirect to")
                .env("AUTHGATE_LOGIN_PATH")
                .global(true)
                .default_value("/login"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub identity_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_url: Option<String>,
    pub scope: Option<String>,
    pub session_file: PathBuf,
    pub login_path: String,
}

impl Options {
    /// Read identity options from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let required = |name: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{name}"))
        };

        Ok(Self {
            identity_url: required(ARG_IDENTITY_URL)?,
            client_id: required(ARG_CLIENT_ID)?,
            redirect_uri: required(ARG_REDIRECT_URI)?,
            authorize_url: matches.get_one::<String>(ARG_AUTHORIZE_URL).cloned(),
            scope: matches.get_one::<String>(ARG_SCOPE).cloned(),
            session_file: matches
                .get_one::<PathBuf>(ARG_SESSION_FILE)
                .cloned()
                .unwrap_or_else(|| PathBuf::from(".authgate/session.json")),
            login_path: required(ARG_LOGIN_PATH)?,
        })
    }
}
