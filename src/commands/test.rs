//! Implementation of the test command.
//!
//! Registers a one-shot alarm a few minutes out, in its own namespace so daily
//! rescheduling never touches it. It plays whatever a regular prayer would play
//! right now, which makes it the quickest way to check the audio chain.

use anyhow::{Context, Result};

use super::AppContext;
use crate::prayer::PrayerClass;

/// Handle `salatr test [minutes]`.
pub fn handle_test_command(delay_minutes: i64, debug_enabled: bool) -> Result<()> {
    log_version!();

    let ctx = AppContext::load()?;
    let resolution = ctx
        .resolver
        .resolve(PrayerClass::Regular, &ctx.voices.active_selection());
    if debug_enabled {
        log_pipe!();
        log_debug!(
            "Test audio from {}: {}",
            resolution.step.as_str(),
            resolution.audio
        );
    }

    let scheduler = ctx.scheduler();
    let alarm = scheduler
        .schedule_one_shot_alarm(delay_minutes, Some(resolution.audio))
        .context("Failed to schedule the test alarm")?;

    let local = alarm.firing_instant.with_timezone(&chrono::Local);
    log_block_start!("Test alarm set for {}", local.format("%H:%M:%S"));
    log_indented!("Id: {}", alarm.id);
    log_indented!(
        "{} test alarm(s) pending",
        scheduler.pending_test_alarms().len()
    );
    if crate::io::lock::running_daemon_pid(ctx.state_dir()).is_none() {
        log_warning!("No 'salatr run' process is active, so nothing will fire it");
        log_indented!("Start one, or fire it by hand: salatr fire {}", alarm.id);
    }
    log_end!();
    Ok(())
}

/// Display help for the test command
pub fn display_help() {
    log_version!();
    log_block_start!("test - Schedule a test alarm");
    log_block_start!("Usage: salatr test [minutes]");
    log_block_start!("Arguments:");
    log_indented!("[minutes]  Delay before the alarm fires (default: 1, 0 = next poll)");
    log_block_start!("Description:");
    log_indented!("Registers a one-shot alarm that plays the current regular-prayer");
    log_indented!("voice. Test alarms are separate from the daily schedule: 'salatr");
    log_indented!("schedule' and 'salatr cancel' leave them alone.");
    log_block_start!("Examples:");
    log_indented!("salatr test");
    log_indented!("salatr test 5");
    log_end!();
}
