//! Maps validated CLI matches to the action to run.

use crate::cli::{
    actions::Action,
    commands::{self, identity},
    globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = GlobalArgs::from(identity::Options::parse(matches)?);

    match matches.subcommand() {
        Some((commands::CMD_LOGIN, _)) => Ok(Action::Login(globals)),
        Some((commands::CMD_CALLBACK, sub_m)) => {
            let redirect_url = sub_m
                .get_one::<String>(commands::ARG_REDIRECT_URL)
                .cloned()
                .context("missing required argument: <redirect-url>")?;
            Ok(Action::Callback {
                globals,
                redirect_url,
            })
        }
        Some((commands::CMD_STATUS, _)) => Ok(Action::Status(globals)),
        Some((commands::CMD_LOGOUT, _)) => Ok(Action::Logout(globals)),
        Some((other, _)) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("missing command")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(extra: &[&str]) -> clap::ArgMatches {
        let mut args = vec![
            "authgate",
            "--identity-url",
            "https://id.example.test",
            "--client-id",
            "admin-web",
            "--redirect-uri",
            "https://app.example.test/auth/callback",
        ];
        args.extend_from_slice(extra);
        commands::new().get_matches_from(args)
    }

    #[test]
    fn callback_action_carries_url() {
        temp_env::with_vars([("AUTHGATE_LOGIN_PATH", None::<&str>)], || {
            let action = handler(&matches(&["callback", "https://app.example.test/cb?code=x"]))
                .unwrap();
            match action {
                Action::Callback {
                    globals,
                    redirect_url,
                } => {
                    assert_eq!(redirect_url, "https://app.example.test/cb?code=x");
                    assert_eq!(globals.client_id, "admin-web");
                    assert_eq!(globals.login_path, "/login");
                }
                other => panic!("unexpected action: {other:?}"),
            }
        });
    }

    #[test]
    fn status_and_logout_actions() {
        assert!(matches!(
            handler(&matches(&["status"])).unwrap(),
            Action::Status(_)
        ));
        assert!(matches!(
            handler(&matches(&["logout"])).unwrap(),
            Action::Logout(_)
        ));
        assert!(matches!(
            handler(&matches(&["login"])).unwrap(),
            Action::Login(_)
        ));
    }

    #[test]
    fn missing_identity_url_is_an_error() {
        temp_env::with_vars([("AUTHGATE_IDENTITY_URL", None::<&str>)], || {
            let matches = commands::new().get_matches_from(vec![
                "authgate",
                "--client-id",
                "admin-web",
                "--redirect-uri",
                "app://cb",
                "status",
            ]);
            let err = handler(&matches).unwrap_err();
            assert!(err.to_string().contains("--identity-url"));
        });
    }
}
