//! Defines the fatal error surface for the command bootstrap.
//!
//! A [`FatalError`] ends the process immediately with [`FatalError::EXIT_STATUS`].
//! Failures raised by a command body are ordinary [`anyhow::Error`] values and
//! are reported separately by the runner.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

use crate::process::{DaemonizeError, PrivilegeError};
use crate::telemetry::TelemetryError;

/// Errors that abort the command before or while it detaches.
#[derive(Debug, Error)]
pub enum FatalError {
    /// Argument parsing failed or help output was requested.
    #[error("{0}")]
    Usage(clap::Error),
    /// A command declared an option that already exists.
    #[error("option {name} is already declared")]
    DuplicateOption {
        /// Name, long flag, or short flag that collided.
        name: String,
    },
    /// No `--config` was given and none of the default locations exist.
    #[error(
        "No config file in default locations ({locations}); you need to specify the --config \
         parameter. Read the documentation on how to create a config.yaml file"
    )]
    MissingDefaultConfig {
        /// Comma-separated list of the locations that were probed.
        locations: String,
    },
    /// The explicitly configured config file does not exist.
    #[error("Cannot find file {} (check the --config parameter)", path.display())]
    ConfigNotFound {
        /// Path supplied through `--config`.
        path: PathBuf,
    },
    /// `--user` was given by a process without superuser privileges.
    #[error("Option --user (-u) cannot be specified by normal users")]
    UserRequiresSuperuser,
    /// `--user` named an account that does not exist.
    #[error("No such user: {name} (check the --user parameter)")]
    NoSuchUser {
        /// Account name supplied through `--user`.
        name: String,
    },
    /// The account database could not be queried.
    #[error("failed to look up user {name}: {source}")]
    UserLookup {
        /// Account name supplied through `--user`.
        name: String,
        /// Underlying lookup error.
        #[source]
        source: PrivilegeError,
    },
    /// A command-specific option failed validation.
    #[error("Invalid value for --{option}: {message}")]
    InvalidOption {
        /// Long name of the rejected option.
        option: String,
        /// Explanation and remediation hint.
        message: String,
    },
    /// Resolving a relative path against the working directory failed.
    #[error("failed to resolve '{}' against the working directory: {source}", path.display())]
    ResolvePath {
        /// Path that could not be made absolute.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Detaching into the background failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Dropping privileges to the requested account failed.
    #[error("failed to switch effective user to {name}: {source}")]
    SwitchUser {
        /// Account name supplied through `--user`.
        name: String,
        /// Underlying privilege error.
        #[source]
        source: PrivilegeError,
    },
    /// The version marker could not be read.
    #[error("failed to read version file '{}': {source}", path.display())]
    Version {
        /// Location of the version marker.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Installing the logging subscriber failed.
    #[error("failed to initialise logging: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

impl FatalError {
    /// Exit status used for every fatal error, help output included.
    pub const EXIT_STATUS: u8 = 2;

    /// Builds a validation failure for a command-specific option.
    pub fn invalid(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Exit code the process terminates with.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(Self::EXIT_STATUS)
    }

    /// Writes the user-facing report for this error.
    ///
    /// Parser output keeps clap's own rendering and stream choice so help text
    /// lands on stdout. Everything else is written to stderr followed by a
    /// pointer to `--help`.
    ///
    /// # Errors
    ///
    /// Returns the IO error when either stream cannot be written.
    pub fn report<W: Write, E: Write>(&self, stdout: &mut W, stderr: &mut E) -> io::Result<()> {
        match self {
            Self::Usage(error) => {
                let rendered = error.render().to_string();
                if error.use_stderr() {
                    stderr.write_all(rendered.as_bytes())?;
                    stderr.flush()
                } else {
                    stdout.write_all(rendered.as_bytes())?;
                    stdout.flush()
                }
            }
            other => {
                writeln!(stderr, "Error: {other}.")?;
                writeln!(stderr, "Try --help for help.")?;
                stderr.flush()
            }
        }
    }
}

impl From<clap::Error> for FatalError {
    fn from(error: clap::Error) -> Self {
        Self::Usage(error)
    }
}

impl From<DaemonizeError> for FatalError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<TelemetryError> for FatalError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}
