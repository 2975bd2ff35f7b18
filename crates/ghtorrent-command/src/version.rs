//! Locates and reads the project version marker.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::FatalError;

const VERSION_FILE: &str = "VERSION";

/// Path of the `VERSION` marker, two directories above this crate.
#[must_use]
pub fn version_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join(VERSION_FILE)
}

/// Reads the contents of the version marker.
///
/// # Errors
///
/// Returns [`FatalError::Version`] when the marker cannot be read.
pub fn version() -> Result<String, FatalError> {
    read(&version_path())
}

pub(crate) fn read(path: &Path) -> Result<String, FatalError> {
    fs::read_to_string(path).map_err(|source| FatalError::Version {
        path: path.to_path_buf(),
        source,
    })
}
