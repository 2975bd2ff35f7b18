//! Extension points commands implement, and the context they receive.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::de::DeserializeOwned;

use crate::errors::FatalError;
use crate::options::{OptionSet, Options};
use crate::version;

/// Customisation points of the command lifecycle.
///
/// The runner calls them in a fixed order: [`Self::declare_options`] while
/// building the parser, [`Self::validate_extra`] after the base checks pass,
/// and [`Self::run_body`] once the process is ready to work.
pub trait CommandHooks {
    /// Declares command options ahead of the standard ones.
    ///
    /// # Errors
    ///
    /// Propagate the error from [`OptionSet::opt`] when a name collides.
    fn declare_options(&self, options: OptionSet) -> Result<OptionSet, FatalError> {
        Ok(options)
    }

    /// Command-specific validation; runs after the config and user checks.
    ///
    /// # Errors
    ///
    /// Any error returned here terminates the process.
    fn validate_extra(&self, _context: &CommandContext) -> Result<(), FatalError> {
        Ok(())
    }

    /// The command's actual work.
    ///
    /// # Errors
    ///
    /// Errors are reported once by the runner and end the process with
    /// status 1.
    fn run_body(&mut self, _context: &CommandContext, _stdout: &mut dyn Write) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a command knows about its invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    name: String,
    command_name: String,
    args: Vec<OsString>,
    options: Options,
    config_path: PathBuf,
    version_path: PathBuf,
}

impl CommandContext {
    pub(crate) fn new(
        name: String,
        command_name: String,
        args: Vec<OsString>,
        options: Options,
        version_path: PathBuf,
    ) -> Self {
        let config_path = options.config().to_path_buf();
        Self {
            name,
            command_name,
            args,
            options,
            config_path,
            version_path,
        }
    }

    pub(crate) fn set_config_path(&mut self, config_path: PathBuf) {
        self.config_path = config_path;
    }

    /// Identifier of the concrete command type.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base name of the invoked executable.
    #[must_use]
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Arguments the command was started with, program name first.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Parsed options.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Config file location; absolute once validation has passed.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        self.config_path.as_path()
    }

    /// Contents of the project version marker.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::Version`] when the marker cannot be read.
    pub fn version(&self) -> Result<String, FatalError> {
        version::read(&self.version_path)
    }

    /// Deserialises the config file as YAML.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not match `T`.
    pub fn load_config<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let path = self.config_path();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}
