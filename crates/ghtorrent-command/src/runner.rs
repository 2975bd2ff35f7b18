//! Sequences the command lifecycle: options, validation, daemonisation, body.

use std::any;
use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use nix::unistd::Uid;
use tracing::{debug, info, warn};

use crate::errors::FatalError;
use crate::hooks::{CommandContext, CommandHooks};
use crate::options::{OptionSet, Options};
use crate::process::{DaemonPlan, Daemonizer, Privileges, SystemDaemonizer, SystemPrivileges};
use crate::report;
use crate::telemetry;
use crate::validation::{ConfigLocations, validate_base};
use crate::version;

const RUNNER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runner");
const FALLBACK_COMMAND_NAME: &str = "ghtorrent";
const DAEMON_NOTICE: &str = "Became a daemon";

/// Exit status when the command body fails.
pub const RUNTIME_FAILURE_STATUS: u8 = 1;

/// Process-level collaborators the lifecycle depends on.
#[derive(Debug, Clone)]
pub struct ProcessControl<D, P> {
    daemonizer: D,
    privileges: P,
    locations: ConfigLocations,
}

impl ProcessControl<SystemDaemonizer, SystemPrivileges> {
    /// Collaborators backed by the real operating system.
    #[must_use]
    pub fn system() -> Self {
        Self::new(
            SystemDaemonizer::new(),
            SystemPrivileges::new(),
            ConfigLocations::default(),
        )
    }
}

impl<D, P> ProcessControl<D, P> {
    /// Bundles explicit collaborators.
    #[must_use]
    pub const fn new(daemonizer: D, privileges: P, locations: ConfigLocations) -> Self {
        Self {
            daemonizer,
            privileges,
            locations,
        }
    }

    /// Daemonisation backend.
    #[must_use]
    pub const fn daemonizer(&self) -> &D {
        &self.daemonizer
    }

    /// Privilege backend.
    #[must_use]
    pub const fn privileges(&self) -> &P {
        &self.privileges
    }

    /// Default config locations.
    #[must_use]
    pub const fn locations(&self) -> &ConfigLocations {
        &self.locations
    }
}

/// A command before its options have been parsed.
#[derive(Debug)]
pub struct Runner<H> {
    hooks: H,
    name: String,
    command_name: String,
    args: Vec<OsString>,
    version_path: PathBuf,
}

impl<H: CommandHooks> Runner<H> {
    /// Takes ownership of the arguments; the first one is the program name.
    pub fn new<I, T>(hooks: H, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let command_name = argv
            .first()
            .and_then(|program| Path::new(program).file_name())
            .map_or_else(
                || FALLBACK_COMMAND_NAME.to_owned(),
                |base| base.to_string_lossy().into_owned(),
            );
        Self {
            name: short_type_name::<H>().to_owned(),
            hooks,
            command_name,
            args: argv,
            version_path: version::version_path(),
        }
    }

    /// Identifier of the concrete command type.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base name of the invoked executable, for diagnostics.
    #[must_use]
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Arguments the runner was built with.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Contents of the project version marker.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::Version`] when the marker cannot be read.
    pub fn version(&self) -> Result<String, FatalError> {
        version::read(&self.version_path)
    }

    /// Declares command options, appends the standard ones, and parses.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::DuplicateOption`] for colliding declarations and
    /// [`FatalError::Usage`] for malformed arguments or `--help`.
    pub fn process_options(self) -> Result<Invocation<H>, FatalError> {
        let declared = self
            .hooks
            .declare_options(OptionSet::new(&self.command_name))?;
        let options = declared.parse(&self.args)?;
        debug!(
            target: RUNNER_TARGET,
            command = %self.name,
            config = %options.config().display(),
            daemon = options.daemon(),
            "options processed"
        );
        Ok(Invocation {
            hooks: self.hooks,
            context: CommandContext::new(
                self.name,
                self.command_name,
                self.args,
                options,
                self.version_path,
            ),
            run_as: None,
        })
    }
}

/// A command whose options have been parsed.
#[derive(Debug)]
pub struct Invocation<H> {
    hooks: H,
    context: CommandContext,
    run_as: Option<Uid>,
}

impl<H: CommandHooks> Invocation<H> {
    /// Context handed to the command hooks.
    #[must_use]
    pub const fn context(&self) -> &CommandContext {
        &self.context
    }

    /// Parsed options.
    #[must_use]
    pub const fn options(&self) -> &Options {
        self.context.options()
    }

    /// The command hooks.
    #[must_use]
    pub const fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Runs the base checks, then the command's own.
    ///
    /// # Errors
    ///
    /// Returns the first failing check; all of them are fatal.
    pub fn validate<P: Privileges>(
        &mut self,
        locations: &ConfigLocations,
        privileges: &P,
    ) -> Result<(), FatalError> {
        let validated = validate_base(self.context.options(), locations, privileges)?;
        self.context.set_config_path(validated.config_path);
        self.run_as = validated.run_as;
        self.hooks.validate_extra(&self.context)
    }

    /// Detaches into the background.
    ///
    /// A superuser process becomes a system daemon, announces it on stderr,
    /// and then switches to the `--user` account if one was validated. Any
    /// other process daemonises in the current working directory.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::Daemonize`] or [`FatalError::SwitchUser`].
    pub fn daemonize<D, P, W, E>(
        &self,
        daemonizer: &D,
        privileges: &P,
        stdout: &mut W,
        stderr: &mut E,
    ) -> Result<(), FatalError>
    where
        D: Daemonizer,
        P: Privileges,
        W: Write,
        E: Write,
    {
        // Buffered output would otherwise be written twice after the fork.
        flush_stream(stdout);
        flush_stream(stderr);
        let app_name = self.context.command_name();
        if privileges.is_superuser() {
            daemonizer.daemonize(&DaemonPlan::system(app_name))?;
            emit(stderr, DAEMON_NOTICE);
            if let (Some(uid), Some(name)) = (self.run_as, self.context.options().user()) {
                privileges
                    .switch_effective_user(uid)
                    .map_err(|source| FatalError::SwitchUser {
                        name: name.to_owned(),
                        source,
                    })?;
                info!(target: RUNNER_TARGET, user = name, "running as requested user");
            }
        } else {
            let dir = env::current_dir().map_err(|source| FatalError::ResolvePath {
                path: PathBuf::from("."),
                source,
            })?;
            daemonizer.daemonize(&DaemonPlan::normal(app_name, dir))?;
        }
        Ok(())
    }

    /// Runs the command body.
    ///
    /// # Errors
    ///
    /// Propagates whatever the body returns.
    pub fn go<W: Write>(&mut self, stdout: &mut W) -> anyhow::Result<()> {
        debug!(target: RUNNER_TARGET, command = %self.context.name(), "running command body");
        self.hooks.run_body(&self.context, stdout)
    }
}

/// Runs a command against the real operating system.
///
/// Returns the exit code for the process: success, 2 for fatal option or
/// validation failures, 1 when the body fails.
pub fn run<H, I, T, W, E>(hooks: H, args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    H: CommandHooks,
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    W: Write,
    E: Write,
{
    run_with(hooks, args, &ProcessControl::system(), stdout, stderr)
}

/// Runs a command with injected process collaborators.
pub fn run_with<H, D, P, I, T, W, E>(
    hooks: H,
    args: I,
    control: &ProcessControl<D, P>,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode
where
    H: CommandHooks,
    D: Daemonizer,
    P: Privileges,
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    W: Write,
    E: Write,
{
    match execute(hooks, args, control, stdout, stderr) {
        Ok(exit_code) => exit_code,
        Err(error) => {
            if let Err(write_error) = error.report(stdout, stderr) {
                warn!(target: RUNNER_TARGET, %write_error, "failed to report fatal error");
            }
            error.exit_code()
        }
    }
}

fn execute<H, D, P, I, T, W, E>(
    hooks: H,
    args: I,
    control: &ProcessControl<D, P>,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, FatalError>
where
    H: CommandHooks,
    D: Daemonizer,
    P: Privileges,
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    W: Write,
    E: Write,
{
    let mut invocation = Runner::new(hooks, args).process_options()?;
    let verbose = invocation.options().verbose();
    telemetry::initialise(verbose)?;
    invocation.validate(control.locations(), control.privileges())?;
    if invocation.options().daemon() {
        invocation.daemonize(control.daemonizer(), control.privileges(), stdout, stderr)?;
    }
    match invocation.go(stdout) {
        Ok(()) => {
            debug!(target: RUNNER_TARGET, "command body completed");
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            debug!(target: RUNNER_TARGET, %error, "command body failed");
            let origin = invocation.context().name();
            if let Err(write_error) = report::write_failure(stderr, &error, origin, verbose) {
                warn!(target: RUNNER_TARGET, %write_error, "failed to report command failure");
            }
            Ok(ExitCode::from(RUNTIME_FAILURE_STATUS))
        }
    }
}

fn flush_stream<S: Write>(stream: &mut S) {
    if let Err(error) = stream.flush() {
        warn!(target: RUNNER_TARGET, %error, "failed to flush output before daemonising");
    }
}

fn emit<S: Write>(stream: &mut S, line: &str) {
    if let Err(error) = writeln!(stream, "{line}").and_then(|()| stream.flush()) {
        warn!(target: RUNNER_TARGET, %error, "failed to write notice");
    }
}

fn short_type_name<H>() -> &'static str {
    let full = any::type_name::<H>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}
