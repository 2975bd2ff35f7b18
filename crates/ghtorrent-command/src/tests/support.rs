//! Recording collaborators shared by the bootstrap test suites.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use nix::errno::Errno;
use nix::unistd::Uid;
use rstest::fixture;
use tempfile::TempDir;

use crate::process::{DaemonPlan, DaemonizeError, Daemonizer, PrivilegeError, Privileges};
use crate::{Arg, CommandContext, CommandHooks, ConfigLocations, FatalError, OptionSet};

pub(super) const PROGRAM: &str = "ght-test";

/// Builds an argument vector with the test program name first.
pub(super) fn args(list: &[&str]) -> Vec<OsString> {
    std::iter::once(PROGRAM)
        .chain(list.iter().copied())
        .map(OsString::from)
        .collect()
}

/// Ordered record of side effects across collaborators.
#[derive(Debug, Clone, Default)]
pub(super) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(super) fn record(&self, entry: impl Into<String>) {
        self.0.lock().expect("journal lock").push(entry.into());
    }

    pub(super) fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal lock").clone()
    }
}

/// Writer that journals each non-empty line it receives.
pub(super) struct JournalWriter {
    journal: Journal,
    stream: &'static str,
    captured: Vec<u8>,
}

impl JournalWriter {
    pub(super) fn new(journal: Journal, stream: &'static str) -> Self {
        Self {
            journal,
            stream,
            captured: Vec::new(),
        }
    }

    pub(super) fn text(&self) -> String {
        String::from_utf8_lossy(&self.captured).into_owned()
    }
}

impl Write for JournalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.captured.extend_from_slice(buf);
        let text = String::from_utf8_lossy(buf);
        let trimmed = text.trim_end();
        if !trimmed.is_empty() {
            self.journal.record(format!("{}:{trimmed}", self.stream));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct RecordingDaemonizer {
    journal: Journal,
    plans: Arc<Mutex<Vec<DaemonPlan>>>,
    fail: bool,
}

impl RecordingDaemonizer {
    pub(super) fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub(super) fn failing(journal: Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(journal)
        }
    }

    pub(super) fn plans(&self) -> Vec<DaemonPlan> {
        self.plans.lock().expect("plans lock").clone()
    }
}

impl Daemonizer for RecordingDaemonizer {
    fn daemonize(&self, plan: &DaemonPlan) -> Result<(), DaemonizeError> {
        self.journal.record(format!("daemonize:{}", plan.app_name()));
        self.plans.lock().expect("plans lock").push(plan.clone());
        if self.fail {
            return Err(DaemonizeError::Output {
                path: plan.output_path(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only log dir"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct FakePrivileges {
    journal: Journal,
    superuser: bool,
    users: Vec<(String, u32)>,
    refuse_switch: bool,
}

impl FakePrivileges {
    pub(super) fn normal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub(super) fn superuser(journal: Journal) -> Self {
        Self {
            superuser: true,
            ..Self::normal(journal)
        }
    }

    pub(super) fn with_user(mut self, name: &str, uid: u32) -> Self {
        self.users.push((name.to_owned(), uid));
        self
    }

    pub(super) fn refusing_switch(self) -> Self {
        Self {
            refuse_switch: true,
            ..self
        }
    }
}

impl Privileges for FakePrivileges {
    fn is_superuser(&self) -> bool {
        self.superuser
    }

    fn lookup_user(&self, name: &str) -> Result<Option<Uid>, PrivilegeError> {
        Ok(self
            .users
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, uid)| Uid::from_raw(*uid)))
    }

    fn switch_effective_user(&self, uid: Uid) -> Result<(), PrivilegeError> {
        self.journal.record(format!("seteuid:{}", uid.as_raw()));
        if self.refuse_switch {
            return Err(PrivilegeError::Switch(Errno::EPERM));
        }
        Ok(())
    }
}

/// How the scripted command body behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) enum BodyOutcome {
    #[default]
    Succeed,
    Fail,
    FailBare,
}

/// Command whose hooks record their calls.
#[derive(Debug, Clone, Default)]
pub(super) struct ScriptedCommand {
    pub(super) extra: Vec<Arg>,
    pub(super) reject: Option<&'static str>,
    pub(super) body: BodyOutcome,
    pub(super) calls: Arc<Mutex<Vec<&'static str>>>,
}

impl ScriptedCommand {
    pub(super) fn with_option(mut self, arg: Arg) -> Self {
        self.extra.push(arg);
        self
    }

    pub(super) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }
}

/// Error with a two-frame cause chain under the message "boom".
pub(super) fn boom() -> anyhow::Error {
    Err::<(), _>(anyhow!("connection refused"))
        .context("fetching events")
        .context("boom")
        .expect_err("chain is an error")
}

impl CommandHooks for ScriptedCommand {
    fn declare_options(&self, options: OptionSet) -> Result<OptionSet, FatalError> {
        self.extra
            .iter()
            .cloned()
            .try_fold(options, OptionSet::opt)
    }

    fn validate_extra(&self, _context: &CommandContext) -> Result<(), FatalError> {
        self.calls.lock().expect("calls lock").push("validate_extra");
        match self.reject {
            Some(message) => Err(FatalError::invalid("mode", message)),
            None => Ok(()),
        }
    }

    fn run_body(&mut self, _context: &CommandContext, stdout: &mut dyn Write) -> anyhow::Result<()> {
        self.calls.lock().expect("calls lock").push("run_body");
        writeln!(stdout, "body ran")?;
        match self.body {
            BodyOutcome::Succeed => Ok(()),
            BodyOutcome::Fail => Err(boom()),
            BodyOutcome::FailBare => Err(anyhow!("boom")),
        }
    }
}

/// Temporary directory holding a `config.yaml`.
pub(super) struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    pub(super) fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    pub(super) fn missing_path(&self) -> PathBuf {
        self.dir.path().join("somefile.yaml")
    }

    pub(super) fn locations(&self) -> ConfigLocations {
        ConfigLocations::new(vec![self.config_path()])
    }

    pub(super) fn empty_locations(&self) -> ConfigLocations {
        ConfigLocations::new(vec![
            self.dir.path().join("absent.yaml"),
            self.dir.path().join("etc").join("config.yaml"),
        ])
    }

    pub(super) fn config_arg(&self) -> String {
        self.config_path().display().to_string()
    }
}

#[fixture]
pub(super) fn config_dir() -> ConfigDir {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("config.yaml"),
        "sql:\n  url: sqlite://ghtorrent.db\nmirror:\n  persister: noop\n",
    )
    .expect("write config");
    ConfigDir { dir }
}
