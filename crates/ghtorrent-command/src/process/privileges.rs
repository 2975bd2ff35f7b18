//! Queries and changes the identity the process runs under.

use nix::errno::Errno;
use nix::unistd::{Uid, User, getuid, seteuid};
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over the OS user and privilege APIs.
pub trait Privileges {
    /// Whether the process was started by the superuser.
    fn is_superuser(&self) -> bool;

    /// Looks up an account by name; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeError::Lookup`] when the account database fails.
    fn lookup_user(&self, name: &str) -> Result<Option<Uid>, PrivilegeError>;

    /// Changes the effective user id of the process.
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeError::Switch`] when the kernel refuses the change.
    fn switch_effective_user(&self, uid: Uid) -> Result<(), PrivilegeError>;
}

/// Errors reported by the privilege backend.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    /// The account database could not be read.
    #[error("account database lookup failed: {0}")]
    Lookup(#[source] Errno),
    /// `seteuid` was rejected by the kernel.
    #[error("seteuid failed: {0}")]
    Switch(#[source] Errno),
}

/// Privilege backend backed by `nix`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPrivileges;

impl SystemPrivileges {
    /// Builds the system privilege backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Privileges for SystemPrivileges {
    fn is_superuser(&self) -> bool {
        getuid().is_root()
    }

    fn lookup_user(&self, name: &str) -> Result<Option<Uid>, PrivilegeError> {
        User::from_name(name)
            .map(|user| user.map(|found| found.uid))
            .map_err(PrivilegeError::Lookup)
    }

    fn switch_effective_user(&self, uid: Uid) -> Result<(), PrivilegeError> {
        seteuid(uid).map_err(PrivilegeError::Switch)?;
        info!(
            target: PROCESS_TARGET,
            uid = uid.as_raw(),
            "switched effective user"
        );
        Ok(())
    }
}
