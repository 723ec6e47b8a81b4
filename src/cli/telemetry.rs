//! Logging setup for the CLI. Logs go to stderr so stdout stays usable for
//! the URLs and destinations the commands print.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn from_flag(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

fn env_filter(verbosity_level: Option<Level>) -> EnvFilter {
    // RUST_LOG overrides the flag-derived default.
    EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy()
}

/// Install the global tracing subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(verbosity_level: Option<Level>, format: LogFormat) -> Result<()> {
    let fmt_layer = match format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(env_filter(verbosity_level));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_from_flag() {
        assert_eq!(LogFormat::from_flag("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_flag("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_flag("text"), LogFormat::Text);
        assert_eq!(LogFormat::from_flag("anything"), LogFormat::Text);
    }
}
