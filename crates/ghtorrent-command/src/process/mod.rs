//! Process-level collaborators: daemonisation and privilege control.

mod daemonizer;
mod privileges;

pub use daemonizer::{DaemonPlan, DaemonizeError, Daemonizer, DirMode, SystemDaemonizer};
pub use privileges::{PrivilegeError, Privileges, SystemPrivileges};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
