//! Entry point for `ght-config-check`.

use std::io;
use std::process::ExitCode;

use ghtorrent_tools::ConfigCheck;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    ghtorrent_command::run(
        ConfigCheck,
        std::env::args_os(),
        &mut stdout,
        &mut stderr,
    )
}
