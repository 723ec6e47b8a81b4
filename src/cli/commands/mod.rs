pub mod identity;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const CMD_LOGIN: &str = "login";
pub const CMD_CALLBACK: &str = "callback";
pub const CMD_STATUS: &str = "status";
pub const CMD_LOGOUT: &str = "logout";
pub const ARG_REDIRECT_URL: &str = "redirect-url";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("authgate")
        .about("Client-side authentication session manager")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new(CMD_LOGIN)
                .about("Print the provider login URL, then complete the pasted redirect URL"),
        )
        .subcommand(
            Command::new(CMD_CALLBACK)
                .about("Complete a redirect callback URL and print the destination")
                .arg(
                    Arg::new(ARG_REDIRECT_URL)
                        .help("Full redirect URL received from the provider")
                        .required(true),
                ),
        )
        .subcommand(Command::new(CMD_STATUS).about("Show the current session status"))
        .subcommand(Command::new(CMD_LOGOUT).about("End the session and forget it"));

    let command = identity::with_args(command);
    logging::with_args(command)
}
