//! Help command implementation for salatr.
//!
//! This module provides a dispatcher for the help command that shows
//! command-specific help or general help based on the arguments provided.

use anyhow::Result;

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("cancel" | "c") => super::cancel::display_help(),
        Some("fire" | "f") => super::fire::display_help(),
        Some("help" | "h") => display_help_help(),
        Some("location" | "l") => super::location::display_help(),
        Some("run") => super::run::display_help(),
        Some("schedule" | "s") => super::schedule::display_help(),
        Some("status" | "S") => super::status::display_help(),
        Some("test" | "t") => super::test::display_help(),
        Some("times" | "T") => super::times::display_help(),
        Some("voices" | "v") => super::voices::display_help(),
        Some(unknown) => {
            log_warning_standalone!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands (for the help command)
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("run [--log <file>]         Fire alarms as they mature");
    log_indented!("schedule, s [--at <time>]  Schedule the next six prayer alarms");
    log_indented!("cancel, c                  Cancel all daily alarms");
    log_indented!("test, t [minutes]          Schedule a test alarm");
    log_indented!("times, T [YYYY-MM-DD]      Show prayer times");
    log_indented!("status, S                  Show pending alarms and active voices");
    log_indented!("voices, v <action>         Manage adhan voices");
    log_indented!("fire, f <alarm-id>         Fire a registered alarm now");
    log_indented!("location, l <lat> <lon>    Set the coordinates used for prayer times");
    log_indented!("help, h [COMMAND]          Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'salatr help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'salatr --help' to see all options and general usage.");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: salatr help [COMMAND]");
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_block_start!("Examples:");
    log_indented!("salatr help");
    log_indented!("salatr help voices");
    log_end!();
}
