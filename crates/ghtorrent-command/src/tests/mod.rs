//! Test suites for the command bootstrap.

mod options_behaviour;
mod support;
