//! Bootstrap for `GHTorrent` command-line utilities.
//!
//! Every utility follows the same lifecycle:
//!
//! 1. **Options**: command options declared through
//!    [`CommandHooks::declare_options`] are merged with the standard
//!    `--config`, `--verbose`, `--daemon`, and `--user` options and parsed.
//! 2. **Validation**: the config file must exist (explicitly or in a default
//!    location) and `--user` is only honoured for the superuser and an
//!    existing account. [`CommandHooks::validate_extra`] runs afterwards.
//! 3. **Daemonisation**: with `--daemon` the process detaches. The superuser
//!    gets a system daemon logging to `/var/log` and may drop to `--user`;
//!    anyone else keeps logs in the working directory.
//! 4. **Body**: [`CommandHooks::run_body`] does the work.
//!
//! Failures in the first three phases are [`FatalError`]s and end the process
//! with status 2. A failing body is reported once with its cause chain and
//! ends the process with status 1.

mod errors;
mod hooks;
pub mod options;
pub mod process;
mod report;
mod runner;
pub mod telemetry;
mod validation;
mod version;

pub use clap::{Arg, ArgAction};
pub use errors::FatalError;
pub use hooks::{CommandContext, CommandHooks};
pub use options::{OptionSet, Options};
pub use runner::{Invocation, ProcessControl, RUNTIME_FAILURE_STATUS, Runner, run, run_with};
pub use validation::ConfigLocations;
pub use version::{version, version_path};

#[cfg(test)]
mod tests;
