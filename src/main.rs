//! Main application entry point.
//!
//! Parses the command line, applies the global flags (`--config`, `--debug`) and
//! hands off to the matching command in `salatr::commands`. Every command returns
//! `anyhow::Result`; errors are printed once here with their context chain and
//! turned into a non-zero exit status.

use anyhow::Context;
use salatr::args::{self, CliAction, ParsedArgs};
use salatr::commands;
use salatr::config;
use salatr::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use salatr::{log_error_exit, log_indented};

fn main() {
    let parsed_args = ParsedArgs::from_env();
    std::process::exit(run(parsed_args.action));
}

fn run(action: CliAction) -> i32 {
    let result = match action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            return EXIT_FAILURE;
        }
        CliAction::Help { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Run {
            debug_enabled,
            config_dir,
            log_file,
        } => with_config_dir(config_dir, || {
            commands::run::handle_run_command(log_file, debug_enabled)
        }),
        CliAction::Schedule {
            debug_enabled,
            config_dir,
            at,
        } => with_config_dir(config_dir, || {
            commands::schedule::handle_schedule_command(at, debug_enabled)
        }),
        CliAction::Cancel {
            debug_enabled,
            config_dir,
        } => with_config_dir(config_dir, || {
            commands::cancel::handle_cancel_command(debug_enabled)
        }),
        CliAction::Test {
            debug_enabled,
            config_dir,
            delay_minutes,
        } => with_config_dir(config_dir, || {
            commands::test::handle_test_command(delay_minutes, debug_enabled)
        }),
        CliAction::Times {
            debug_enabled,
            config_dir,
            date,
        } => with_config_dir(config_dir, || {
            commands::times::handle_times_command(date, debug_enabled)
        }),
        CliAction::Status {
            debug_enabled,
            config_dir,
        } => with_config_dir(config_dir, || {
            commands::status::handle_status_command(debug_enabled)
        }),
        CliAction::Voices {
            debug_enabled,
            config_dir,
            action,
        } => with_config_dir(config_dir, || {
            commands::voices::handle_voices_command(action, debug_enabled)
        }),
        CliAction::Fire {
            debug_enabled,
            config_dir,
            alarm_id,
        } => with_config_dir(config_dir, || {
            commands::fire::handle_fire_command(&alarm_id, debug_enabled)
        }),
        CliAction::Location {
            debug_enabled,
            config_dir,
            latitude,
            longitude,
        } => with_config_dir(config_dir, || {
            commands::location::handle_location_command(latitude, longitude, debug_enabled)
        }),
    };

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            log_error_exit!("{}", e);
            for cause in e.chain().skip(1) {
                log_indented!("caused by: {}", cause);
            }
            EXIT_FAILURE
        }
    }
}

/// Install the `--config` directory before the command touches any path.
fn with_config_dir(
    config_dir: Option<String>,
    command: impl FnOnce() -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    if let Some(ref dir) = config_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {dir}"))?;
    }
    config::set_config_dir(config_dir)?;
    command()
}
