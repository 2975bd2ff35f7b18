//! Option declaration, parsing, and runner identity.

use std::path::Path;

use rstest::rstest;

use crate::{Arg, ArgAction, FatalError, Runner};

use super::support::{ScriptedCommand, args};

fn mode_option() -> Arg {
    Arg::new("mode")
        .short('m')
        .long("mode")
        .value_name("MODE")
        .help("retrieval mode")
}

#[rstest]
fn standard_options_have_defaults() {
    let invocation = Runner::new(ScriptedCommand::default(), args(&[]))
        .process_options()
        .expect("parse defaults");
    let options = invocation.options();

    assert_eq!(options.config(), Path::new("config.yaml"));
    assert!(!options.config_given());
    assert!(!options.verbose());
    assert!(!options.daemon());
    assert_eq!(options.user(), None);
}

#[rstest]
#[case(&["-c", "ght.yaml", "-v", "-d", "-u", "bob"])]
#[case(&["--config", "ght.yaml", "--verbose", "--daemon", "--user", "bob"])]
fn standard_options_parse_short_and_long_forms(#[case] flags: &[&str]) {
    let invocation = Runner::new(ScriptedCommand::default(), args(flags))
        .process_options()
        .expect("parse flags");
    let options = invocation.options();

    assert_eq!(options.config(), Path::new("ght.yaml"));
    assert!(options.config_given());
    assert!(options.verbose());
    assert!(options.daemon());
    assert_eq!(options.user(), Some("bob"));
}

#[rstest]
fn declared_options_are_queryable_by_name() {
    let command = ScriptedCommand::default()
        .with_option(mode_option())
        .with_option(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue),
        )
        .with_option(
            Arg::new("repo")
                .long("repo")
                .action(ArgAction::Append),
        );
    let invocation = Runner::new(
        command,
        args(&["--mode", "full", "--dry-run", "--repo", "a/b", "--repo", "c/d"]),
    )
    .process_options()
    .expect("parse declared options");
    let options = invocation.options();

    assert_eq!(options.get_one::<String>("mode").map(String::as_str), Some("full"));
    assert!(options.get_flag("dry-run"));
    let repos: Vec<&String> = options.get_many::<String>("repo").collect();
    assert_eq!(repos, ["a/b", "c/d"]);
    assert_eq!(options.get_one::<String>("undeclared"), None);
    assert!(!options.get_flag("undeclared"));
}

#[rstest]
#[case(&["--mode"])]
#[case(&["--config"])]
#[case(&["--user"])]
fn missing_value_is_a_usage_error(#[case] flags: &[&str]) {
    let command = ScriptedCommand::default().with_option(mode_option());
    let calls = command.calls.clone();

    let error = Runner::new(command, args(flags))
        .process_options()
        .expect_err("value is required");

    assert!(matches!(error, FatalError::Usage(_)));
    assert!(calls.lock().expect("calls lock").is_empty());
}

#[rstest]
fn unknown_flag_is_a_usage_error() {
    let error = Runner::new(ScriptedCommand::default(), args(&["--frobnicate"]))
        .process_options()
        .expect_err("unknown flag");
    assert!(matches!(error, FatalError::Usage(_)));
}

#[rstest]
#[case(Arg::new("config").long("settings"), "config")]
#[case(Arg::new("level").short('v'), "-v")]
#[case(Arg::new("background").long("daemon"), "--daemon")]
#[case(Arg::new("assist").short('h'), "-h")]
fn declarations_cannot_shadow_standard_options(#[case] arg: Arg, #[case] expected: &str) {
    let command = ScriptedCommand::default().with_option(arg);

    let error = Runner::new(command, args(&[]))
        .process_options()
        .expect_err("collision is rejected");

    match error {
        FatalError::DuplicateOption { name } => assert_eq!(name, expected),
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn declarations_must_be_unique_among_themselves() {
    let command = ScriptedCommand::default()
        .with_option(mode_option())
        .with_option(Arg::new("method").short('m'));

    let error = Runner::new(command, args(&[]))
        .process_options()
        .expect_err("duplicate short flag");

    assert!(matches!(error, FatalError::DuplicateOption { name } if name == "-m"));
}

#[rstest]
fn help_lists_command_options_before_standard_options() {
    let command = ScriptedCommand::default().with_option(mode_option());

    let error = Runner::new(command, args(&["--help"]))
        .process_options()
        .expect_err("help ends parsing");

    let FatalError::Usage(usage) = &error else {
        panic!("expected usage error, got {error}");
    };
    assert!(!usage.use_stderr());
    let help = usage.render().to_string();
    let mode_at = help.find("--mode").expect("command option listed");
    let standard_at = help.find("Standard options").expect("standard heading");
    assert!(mode_at < standard_at);
    assert!(help.contains("--config <FILE>"));
    assert!(help.contains("config.yaml file location"));
}

#[rstest]
#[case(&["/usr/local/bin/ght-mirror-events"], "ght-mirror-events")]
#[case(&["ght-retrieve-repo", "-v"], "ght-retrieve-repo")]
#[case(&[], "ghtorrent")]
fn command_name_is_program_base_name(#[case] argv: &[&str], #[case] expected: &str) {
    let runner = Runner::new(ScriptedCommand::default(), argv.iter().copied());
    assert_eq!(runner.command_name(), expected);
}

#[rstest]
fn runner_keeps_invocation_arguments() {
    let argv = args(&["-v", "--config", "ght.yaml"]);
    let invocation = Runner::new(ScriptedCommand::default(), argv.clone())
        .process_options()
        .expect("parse");

    assert_eq!(invocation.context().args(), argv.as_slice());
    assert_eq!(invocation.context().name(), "ScriptedCommand");
}

#[rstest]
fn version_reads_workspace_marker() {
    let runner = Runner::new(ScriptedCommand::default(), args(&[]));
    let version = runner.version().expect("VERSION marker is readable");

    assert_eq!(version.trim(), env!("CARGO_PKG_VERSION"));
    assert!(crate::version_path().ends_with("VERSION"));

    let invocation = runner.process_options().expect("parse");
    let from_context = invocation.context().version().expect("context reads marker");
    assert_eq!(from_context, version);
}

#[rstest]
fn explicit_default_config_counts_as_given() {
    let invocation = Runner::new(ScriptedCommand::default(), args(&["--config", "config.yaml"]))
        .process_options()
        .expect("parse");

    assert!(invocation.options().config_given());
}
