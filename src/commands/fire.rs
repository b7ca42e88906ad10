//! Implementation of the fire command.
//!
//! Fires one registered alarm immediately, the same way the daemon would, and
//! stays in the foreground until the adhan finishes or the user interrupts it.

use anyhow::{Context, Result};
use std::time::Duration;

use super::AppContext;
use crate::alarm::{AlarmState, FireOutcome};
use crate::alarm::registry::AlarmRegistry;
use crate::error::CoreError;
use crate::io::signals::setup_signal_handler;

const PLAYBACK_POLL: Duration = Duration::from_millis(100);

/// Handle `salatr fire <alarm-id>`.
pub fn handle_fire_command(alarm_id: &str, debug_enabled: bool) -> Result<()> {
    log_version!();

    let ctx = AppContext::load()?;
    let entry = ctx
        .registry
        .get(alarm_id)
        .with_context(|| format!("No alarm with id '{alarm_id}'. See 'salatr status'"))?;

    match entry.state {
        AlarmState::Pending => match ctx.registry.mark_fired(alarm_id) {
            Ok(()) => {}
            // The daemon got there first; play it anyway since it was asked for
            Err(CoreError::AlarmNotFound(_)) => log_indented!("Alarm was fired meanwhile"),
            Err(e) => return Err(e.into()),
        },
        state => log_indented!(
            "Replaying an alarm that is already {}",
            format!("{state:?}").to_lowercase()
        ),
    }

    if debug_enabled {
        log_pipe!();
        log_debug!(
            "{} was due at {}",
            entry.alarm.tag,
            entry.alarm.firing_instant.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    let signals = setup_signal_handler()?;
    let handler = ctx.firing_handler();
    match handler.on_fire(&entry.alarm.payload) {
        FireOutcome::Playing(source) => {
            log_indented!("Press Ctrl+C to stop");
            while signals.is_running() && handler.is_playing() {
                std::thread::sleep(PLAYBACK_POLL);
            }
            handler.stop();
            if debug_enabled {
                log_debug!("Finished {}", source);
            }
        }
        FireOutcome::NotifiedOnly => {}
        FireOutcome::Silent => anyhow::bail!("No audio source could be played"),
    }

    log_end!();
    Ok(())
}

/// Display help for the fire command
pub fn display_help() {
    log_version!();
    log_block_start!("fire - Fire a registered alarm now");
    log_block_start!("Usage: salatr fire <alarm-id>");
    log_block_start!("Description:");
    log_indented!("Shows the alarm's notification and plays its adhan, falling back");
    log_indented!("to the bundled file and then the remote default if needed. A");
    log_indented!("pending alarm is marked fired so the daemon will not repeat it.");
    log_indented!("Alarm ids are listed by 'salatr status'.");
    log_end!();
}
