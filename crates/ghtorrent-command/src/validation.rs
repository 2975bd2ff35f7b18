//! Base validation shared by all commands.

use std::fs;
use std::path::{self, Path, PathBuf};

use nix::unistd::Uid;
use tracing::debug;

use crate::errors::FatalError;
use crate::options::{DEFAULT_CONFIG, Options};
use crate::process::Privileges;

const VALIDATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::validation");
const SYSTEM_CONFIG: &str = "/etc/ghtorrent/config.yaml";

/// Ordered candidates probed when `--config` is not given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocations {
    candidates: Vec<PathBuf>,
}

impl ConfigLocations {
    /// Uses the given candidates, probed in order.
    #[must_use]
    pub const fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Candidate paths in probe order.
    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    fn first_existing(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|candidate| file_exists(candidate))
    }

    fn describe(&self) -> String {
        self.candidates
            .iter()
            .map(|candidate| candidate.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ConfigLocations {
    /// `./config.yaml`, then `/etc/ghtorrent/config.yaml`.
    fn default() -> Self {
        Self::new(vec![
            PathBuf::from(DEFAULT_CONFIG),
            PathBuf::from(SYSTEM_CONFIG),
        ])
    }
}

/// Outcome of the base checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Validated {
    pub(crate) config_path: PathBuf,
    pub(crate) run_as: Option<Uid>,
}

/// Runs the config and user checks in that order.
pub(crate) fn validate_base<P: Privileges>(
    options: &Options,
    locations: &ConfigLocations,
    privileges: &P,
) -> Result<Validated, FatalError> {
    let config_path = resolve_config(options, locations)?;
    let run_as = check_user(options, privileges)?;
    debug!(
        target: VALIDATION_TARGET,
        config = %config_path.display(),
        run_as = run_as.map(Uid::as_raw),
        "base validation passed"
    );
    Ok(Validated {
        config_path,
        run_as,
    })
}

/// Resolves the config file to an absolute path.
///
/// The path is made absolute so it stays valid once a daemon changes its
/// working directory.
fn resolve_config(options: &Options, locations: &ConfigLocations) -> Result<PathBuf, FatalError> {
    let found = if options.config_given() {
        let explicit = options.config();
        if !file_exists(explicit) {
            return Err(FatalError::ConfigNotFound {
                path: explicit.to_path_buf(),
            });
        }
        explicit
    } else {
        locations
            .first_existing()
            .ok_or_else(|| FatalError::MissingDefaultConfig {
                locations: locations.describe(),
            })?
    };
    path::absolute(found).map_err(|source| FatalError::ResolvePath {
        path: found.to_path_buf(),
        source,
    })
}

fn check_user<P: Privileges>(options: &Options, privileges: &P) -> Result<Option<Uid>, FatalError> {
    let Some(name) = options.user() else {
        return Ok(None);
    };
    if !privileges.is_superuser() {
        return Err(FatalError::UserRequiresSuperuser);
    }
    match privileges.lookup_user(name) {
        Ok(Some(uid)) => Ok(Some(uid)),
        Ok(None) => Err(FatalError::NoSuchUser {
            name: name.to_owned(),
        }),
        Err(source) => Err(FatalError::UserLookup {
            name: name.to_owned(),
            source,
        }),
    }
}

fn file_exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}
