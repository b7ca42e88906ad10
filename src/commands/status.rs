//! Status command - show what is scheduled and who will fire it.
//!
//! Reads the registry and the voice pointers straight from the state directory,
//! so it works whether or not a daemon is running.

use anyhow::Result;

use super::AppContext;
use super::schedule::log_alarm_list;
use crate::io::lock::running_daemon_pid;
use crate::prayer::PrayerClass;

/// Handle `salatr status`.
pub fn handle_status_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let ctx = AppContext::load()?;
    if debug_enabled {
        ctx.config.log_config();
    }

    log_block_start!("Daemon");
    match running_daemon_pid(ctx.state_dir()) {
        Some(pid) => log_indented!("Running (PID: {})", pid),
        None => log_indented!("Not running. Start it with 'salatr run'"),
    }

    let scheduler = ctx.scheduler();
    let tz = ctx
        .config
        .schedule_request()
        .map(|request| request.timezone)
        .unwrap_or(chrono_tz::UTC);

    let daily = scheduler.pending_alarms();
    if daily.is_empty() {
        log_block_start!("No daily alarms pending");
        log_indented!("Run 'salatr schedule' to set them");
    } else {
        log_block_start!("Pending daily alarms: {}", daily.len());
        log_alarm_list(&daily, tz, ctx.clock.as_ref());
    }

    let tests = scheduler.pending_test_alarms();
    if !tests.is_empty() {
        log_block_start!("Pending test alarms: {}", tests.len());
        log_alarm_list(&tests, tz, ctx.clock.as_ref());
    }

    log_block_start!("Active voices");
    let selection = ctx.voices.active_selection();
    for class in [PrayerClass::Regular, PrayerClass::Dawn] {
        let resolution = ctx.resolver.resolve(class, &selection);
        let chosen = selection
            .for_class(class)
            .map(|record| record.display_name.as_str())
            .unwrap_or("none");
        log_indented!(
            "{:<8} {} (plays {}: {})",
            class.to_string(),
            chosen,
            resolution.step.as_str(),
            resolution.audio
        );
    }

    log_end!();
    Ok(())
}

/// Display help for the status command
pub fn display_help() {
    log_version!();
    log_block_start!("status - Show pending alarms and active voices");
    log_block_start!("Usage: salatr status");
    log_block_start!("Description:");
    log_indented!("Lists the pending daily and test alarms with the audio each will");
    log_indented!("play, whether 'salatr run' is active, and which voice each");
    log_indented!("prayer class resolves to right now.");
    log_end!();
}
