//! Implements the daemonisation backend for commands run with `--daemon`.

use std::backtrace::Backtrace;
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io;
use std::panic;
use std::path::{Path, PathBuf};

use daemonize_me::Daemon;
use thiserror::Error;
use tracing::{error, info};

use super::PROCESS_TARGET;

const SYSTEM_LOG_DIR: &str = "/var/log";
const SYSTEM_PID_DIR: &str = "/var/run";
const SYSTEM_WORK_DIR: &str = "/";

/// Abstraction over daemonisation strategies.
pub trait Daemonizer {
    /// Detaches the process into the background.
    ///
    /// Returns in the detached child; the parent side belongs to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonizeError`] when the output log cannot be opened or the
    /// process cannot detach.
    fn daemonize(&self, plan: &DaemonPlan) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// The output log could not be opened.
    #[error("failed to open daemon output '{}': {source}", path.display())]
    Output {
        /// Output log path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

/// Where the daemon keeps its working directory and pid file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirMode {
    /// System service layout: `/` as working directory, pid under `/var/run`.
    System,
    /// Everything stays in `dir`.
    Normal {
        /// Directory used for the pid file, logs and working directory.
        dir: PathBuf,
    },
}

/// Describes how a command should detach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPlan {
    app_name: String,
    dir_mode: DirMode,
    log_dir: PathBuf,
    backtrace: bool,
    log_output: bool,
}

impl DaemonPlan {
    /// Plan for a superuser process: a system daemon logging to `/var/log`.
    #[must_use]
    pub fn system(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_owned(),
            dir_mode: DirMode::System,
            log_dir: PathBuf::from(SYSTEM_LOG_DIR),
            backtrace: true,
            log_output: true,
        }
    }

    /// Plan for an unprivileged process: everything lives in `dir`.
    #[must_use]
    pub fn normal(app_name: &str, dir: PathBuf) -> Self {
        Self {
            app_name: app_name.to_owned(),
            log_dir: dir.clone(),
            dir_mode: DirMode::Normal { dir },
            backtrace: true,
            log_output: true,
        }
    }

    /// Name the daemon runs under.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Directory layout mode.
    #[must_use]
    pub const fn dir_mode(&self) -> &DirMode {
        &self.dir_mode
    }

    /// Directory receiving captured output.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        self.log_dir.as_path()
    }

    /// Whether panics in the daemon are logged with a backtrace.
    #[must_use]
    pub const fn backtrace(&self) -> bool {
        self.backtrace
    }

    /// Whether stdout and stderr are captured to [`Self::output_path`].
    #[must_use]
    pub const fn log_output(&self) -> bool {
        self.log_output
    }

    /// Working directory of the detached process.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        match &self.dir_mode {
            DirMode::System => Path::new(SYSTEM_WORK_DIR),
            DirMode::Normal { dir } => dir.as_path(),
        }
    }

    /// Pid file written by the detached process.
    #[must_use]
    pub fn pid_path(&self) -> PathBuf {
        let file = format!("{}.pid", self.app_name);
        match &self.dir_mode {
            DirMode::System => Path::new(SYSTEM_PID_DIR).join(file),
            DirMode::Normal { dir } => dir.join(file),
        }
    }

    /// File receiving captured stdout and stderr.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.output", self.app_name))
    }
}

/// Daemoniser that delegates to `daemonize-me`.
#[derive(Debug, Default)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    /// Builds a new system daemoniser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, plan: &DaemonPlan) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            app = plan.app_name(),
            work_dir = %plan.work_dir().display(),
            log_dir = %plan.log_dir().display(),
            "daemonising into background"
        );
        let mut daemon = Daemon::new()
            .name(OsStr::new(plan.app_name()))
            .work_dir(plan.work_dir())
            .pid_file(plan.pid_path(), Some(false));
        if plan.log_output() {
            let path = plan.output_path();
            let stdout = open_output(&path)?;
            let stderr = stdout
                .try_clone()
                .map_err(|source| DaemonizeError::Output { path, source })?;
            daemon = daemon.stdout(stdout).stderr(stderr);
        }
        daemon.start()?;
        if plan.backtrace() {
            install_panic_logger();
        }
        info!(
            target: PROCESS_TARGET,
            pid = std::process::id(),
            "daemon process detached; continuing in child"
        );
        Ok(())
    }
}

fn open_output(path: &Path) -> Result<File, DaemonizeError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| DaemonizeError::Output {
            path: path.to_path_buf(),
            source,
        })
}

fn install_panic_logger() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::force_capture();
        error!(
            target: PROCESS_TARGET,
            panic = %info,
            %backtrace,
            "daemon panicked"
        );
        previous(info);
    }));
}
