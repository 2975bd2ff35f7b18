//! Option declaration and parsing shared by every command.
//!
//! Commands receive an [`OptionSet`] through
//! [`CommandHooks::declare_options`](crate::CommandHooks::declare_options) and
//! add their own arguments to it. The standard options are appended once the
//! command is done, so command options come first in the help output while
//! every option shares one namespace.

use std::any::Any;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use crate::errors::FatalError;

/// Name of the config file option.
pub const CONFIG: &str = "config";
/// Name of the verbose flag.
pub const VERBOSE: &str = "verbose";
/// Name of the daemon flag.
pub const DAEMON: &str = "daemon";
/// Name of the user option.
pub const USER: &str = "user";
/// Value used for `--config` when the flag is omitted.
pub const DEFAULT_CONFIG: &str = "config.yaml";

const STANDARD_HEADING: &str = "Standard options";
const RESERVED_NAMES: &[&str] = &[CONFIG, VERBOSE, DAEMON, USER, "help"];
const RESERVED_SHORTS: &[char] = &['c', 'v', 'd', 'u', 'h'];

/// Builder for the options a command accepts.
#[derive(Debug, Clone)]
pub struct OptionSet {
    command: Command,
}

impl OptionSet {
    pub(crate) fn new(command_name: &str) -> Self {
        Self {
            command: Command::new(command_name.to_owned()).disable_version_flag(true),
        }
    }

    /// Sets the description shown above the usage line.
    #[must_use]
    pub fn about(mut self, text: impl Into<String>) -> Self {
        self.command = self.command.about(text.into());
        self
    }

    /// Declares an additional option.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::DuplicateOption`] when the option's name, long
    /// flag, or short flag is already taken by a standard option or by an
    /// option declared earlier.
    pub fn opt(mut self, arg: Arg) -> Result<Self, FatalError> {
        if let Some(name) = self.collision(&arg) {
            return Err(FatalError::DuplicateOption { name });
        }
        self.command = self.command.arg(arg);
        Ok(self)
    }

    fn collision(&self, arg: &Arg) -> Option<String> {
        let id = arg.get_id();
        if RESERVED_NAMES.contains(&id.as_str())
            || self.command.get_arguments().any(|known| known.get_id() == id)
        {
            return Some(id.as_str().to_owned());
        }
        if let Some(long) = arg.get_long()
            && (RESERVED_NAMES.contains(&long)
                || self
                    .command
                    .get_arguments()
                    .any(|known| known.get_long() == Some(long)))
        {
            return Some(format!("--{long}"));
        }
        if let Some(short) = arg.get_short()
            && (RESERVED_SHORTS.contains(&short)
                || self
                    .command
                    .get_arguments()
                    .any(|known| known.get_short() == Some(short)))
        {
            return Some(format!("-{short}"));
        }
        None
    }

    /// Appends the standard options and returns the finished parser.
    pub(crate) fn into_parser(self) -> Command {
        self.command.args(standard_options())
    }

    /// Parses `args`, the first of which is the program name.
    pub(crate) fn parse(self, args: &[OsString]) -> Result<Options, FatalError> {
        let matches = self.into_parser().try_get_matches_from(args)?;
        Ok(Options::from_matches(matches))
    }
}

fn standard_options() -> [Arg; 4] {
    [
        Arg::new(CONFIG)
            .short('c')
            .long(CONFIG)
            .value_name("FILE")
            .help("config.yaml file location")
            .default_value(DEFAULT_CONFIG)
            .value_parser(value_parser!(PathBuf))
            .help_heading(STANDARD_HEADING),
        Arg::new(VERBOSE)
            .short('v')
            .long(VERBOSE)
            .action(ArgAction::SetTrue)
            .help("verbose mode")
            .help_heading(STANDARD_HEADING),
        Arg::new(DAEMON)
            .short('d')
            .long(DAEMON)
            .action(ArgAction::SetTrue)
            .help("run as daemon")
            .help_heading(STANDARD_HEADING),
        Arg::new(USER)
            .short('u')
            .long(USER)
            .value_name("USER")
            .help("run as the specified user (only when started as root)")
            .help_heading(STANDARD_HEADING),
    ]
}

/// Parsed command-line options.
///
/// Holds the standard options in typed form and keeps the raw matches so
/// command-declared options can be queried by name.
#[derive(Debug, Clone)]
pub struct Options {
    config: PathBuf,
    config_given: bool,
    verbose: bool,
    daemon: bool,
    user: Option<String>,
    matches: ArgMatches,
}

impl Options {
    fn from_matches(matches: ArgMatches) -> Self {
        let config = matches
            .get_one::<PathBuf>(CONFIG)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
        let config_given = matches.value_source(CONFIG) == Some(ValueSource::CommandLine);
        let user = matches.get_one::<String>(USER).cloned();
        Self {
            config,
            config_given,
            verbose: matches.get_flag(VERBOSE),
            daemon: matches.get_flag(DAEMON),
            user,
            matches,
        }
    }

    /// Config file location, `config.yaml` unless overridden.
    #[must_use]
    pub fn config(&self) -> &Path {
        self.config.as_path()
    }

    /// Whether `--config` was passed explicitly.
    #[must_use]
    pub const fn config_given(&self) -> bool {
        self.config_given
    }

    /// Whether verbose output was requested.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether the command should detach into the background.
    #[must_use]
    pub const fn daemon(&self) -> bool {
        self.daemon
    }

    /// Account to run as once daemonised.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Value of a command-declared option.
    ///
    /// Returns `None` when the option is absent, undeclared, or of a
    /// different type.
    #[must_use]
    pub fn get_one<T>(&self, name: &str) -> Option<&T>
    where
        T: Any + Clone + Send + Sync + 'static,
    {
        self.matches.try_get_one::<T>(name).ok().flatten()
    }

    /// All values of a command-declared option, in command-line order.
    pub fn get_many<T>(&self, name: &str) -> impl Iterator<Item = &T>
    where
        T: Any + Clone + Send + Sync + 'static,
    {
        self.matches
            .try_get_many::<T>(name)
            .ok()
            .flatten()
            .into_iter()
            .flatten()
    }

    /// State of a command-declared flag; `false` when undeclared.
    #[must_use]
    pub fn get_flag(&self, name: &str) -> bool {
        self.get_one::<bool>(name).copied().unwrap_or(false)
    }
}
