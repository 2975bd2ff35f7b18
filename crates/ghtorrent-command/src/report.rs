//! Reports failures raised by a command body.

use std::io::{self, Write};
use std::iter;

/// Renders the trace of `error`: one line per cause in its source chain,
/// closed by the frame of the command body that raised it.
///
/// Every failure has at least the origin frame. Non-verbose output keeps only
/// the first frame.
pub(crate) fn trace_lines(error: &anyhow::Error, origin: &str, verbose: bool) -> Vec<String> {
    let frames = error
        .chain()
        .skip(1)
        .map(|cause| format!("    caused by: {cause}"))
        .chain(iter::once(format!("    at {origin}::run_body")));
    if verbose {
        frames.collect()
    } else {
        frames.take(1).collect()
    }
}

/// Writes the error message followed by its trace.
pub(crate) fn write_failure<E: Write>(
    stderr: &mut E,
    error: &anyhow::Error,
    origin: &str,
    verbose: bool,
) -> io::Result<()> {
    writeln!(stderr, "{error}")?;
    for line in trace_lines(error, origin, verbose) {
        writeln!(stderr, "{line}")?;
    }
    stderr.flush()
}
