//! Structured logging initialisation for commands.

use std::env;
use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Environment variable overriding the log filter.
pub const LOG_ENV_VAR: &str = "GHTORRENT_LOG";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// global state, so the verbosity of the first call wins.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is malformed or another global
/// subscriber is already installed.
pub fn initialise(verbose: bool) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| {
            let directive = filter_directive(env::var(LOG_ENV_VAR).ok(), verbose);
            install_subscriber(&directive)
        })
        .map(|&()| TelemetryHandle)
}

/// Picks the filter: an explicit override wins, otherwise `warn`, or `debug`
/// in verbose mode.
fn filter_directive(env_override: Option<String>, verbose: bool) -> String {
    env_override
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| if verbose { "debug" } else { "warn" }.to_owned())
}

fn install_subscriber(directive: &str) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::filter_directive;

    #[rstest]
    #[case(None, false, "warn")]
    #[case(None, true, "debug")]
    #[case(Some("   "), true, "debug")]
    #[case(Some("ghtorrent_command=trace"), false, "ghtorrent_command=trace")]
    fn filter_directive_prefers_override(
        #[case] env_override: Option<&str>,
        #[case] verbose: bool,
        #[case] expected: &str,
    ) {
        let directive = filter_directive(env_override.map(str::to_owned), verbose);
        assert_eq!(directive, expected);
    }
}
