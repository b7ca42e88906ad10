//! Implementation of the cancel command.

use anyhow::{Context, Result};

use super::AppContext;
use crate::alarm::CancelOutcome;
use crate::io::lock::ScheduleLock;

/// Cancel every pending daily alarm. Test alarms are left to fire.
pub fn handle_cancel_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let ctx = AppContext::load()?;
    let _lock = ScheduleLock::acquire(ctx.state_dir())?;
    let outcomes = ctx
        .scheduler()
        .cancel_all_alarms()
        .context("Failed to clear the daily alarm list")?;

    if outcomes.is_empty() {
        log_block_start!("No daily alarms were scheduled");
        log_end!();
        return Ok(());
    }

    let cancelled = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, CancelOutcome::Cancelled(_)))
        .count();
    log_block_start!("Cancelled {} alarms", cancelled);

    for outcome in &outcomes {
        match outcome {
            CancelOutcome::Cancelled(id) if debug_enabled => log_debug!("Cancelled {}", id),
            CancelOutcome::NotPending(id) if debug_enabled => {
                log_debug!("{} had already fired or been cancelled", id)
            }
            CancelOutcome::Failed { id, reason } => {
                log_warning!("Could not cancel {}: {}", id, reason)
            }
            _ => {}
        }
    }

    log_end!();
    Ok(())
}

/// Display help for the cancel command
pub fn display_help() {
    log_version!();
    log_block_start!("cancel - Cancel all daily prayer alarms");
    log_block_start!("Usage: salatr cancel");
    log_block_start!("Description:");
    log_indented!("Cancels every pending daily alarm and forgets the daily list.");
    log_indented!("Test alarms from 'salatr test' are not affected. A running");
    log_indented!("'salatr run' schedules a fresh day on its next poll; stop it");
    log_indented!("first to silence alarms for good.");
    log_end!();
}
