//! `GHTorrent` utilities built on [`ghtorrent_command`].
//!
//! `ght-config-check` validates a `GHTorrent` `config.yaml` before a long
//! running mirror or retrieval job is pointed at it.

use std::io::Write;

use anyhow::{Context as _, anyhow};
use ghtorrent_command::{Arg, ArgAction, CommandContext, CommandHooks, FatalError, OptionSet};
use serde_yaml::Mapping;

const REQUIRE: &str = "require";
const QUIET: &str = "quiet";

/// Checks that a config file parses and lists its top-level sections.
#[derive(Debug, Default)]
pub struct ConfigCheck;

impl CommandHooks for ConfigCheck {
    fn declare_options(&self, options: OptionSet) -> Result<OptionSet, FatalError> {
        options
            .about("Check a GHTorrent config.yaml and list its top-level sections")
            .opt(
                Arg::new(REQUIRE)
                    .short('r')
                    .long(REQUIRE)
                    .value_name("SECTION")
                    .action(ArgAction::Append)
                    .help("top-level section that must be present (repeatable)"),
            )?
            .opt(
                Arg::new(QUIET)
                    .short('q')
                    .long(QUIET)
                    .action(ArgAction::SetTrue)
                    .help("print nothing on success"),
            )
    }

    fn validate_extra(&self, context: &CommandContext) -> Result<(), FatalError> {
        if context
            .options()
            .get_many::<String>(REQUIRE)
            .any(|section| section.trim().is_empty())
        {
            return Err(FatalError::invalid(
                REQUIRE,
                "section names must not be empty",
            ));
        }
        Ok(())
    }

    fn run_body(&mut self, context: &CommandContext, stdout: &mut dyn Write) -> anyhow::Result<()> {
        let settings: Mapping = context.load_config()?;
        let sections = section_names(&settings);
        let missing: Vec<&str> = context
            .options()
            .get_many::<String>(REQUIRE)
            .map(|section| section.trim())
            .filter(|section| !sections.contains(section))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!(
                "missing top-level section(s): {}",
                missing.join(", ")
            ))
            .with_context(|| {
                format!(
                    "config file {} is incomplete",
                    context.config_path().display()
                )
            });
        }
        if context.options().get_flag(QUIET) {
            return Ok(());
        }

        let version = context.version()?;
        writeln!(stdout, "{} {}", context.command_name(), version.trim())?;
        writeln!(stdout, "config: {}", context.config_path().display())?;
        for section in sections {
            writeln!(stdout, "  {section}")?;
        }
        Ok(())
    }
}

/// String keys of the top-level mapping, in file order.
fn section_names(settings: &Mapping) -> Vec<&str> {
    settings.keys().filter_map(|key| key.as_str()).collect()
}
