//! Implementation of the run command: the alarm daemon.
//!
//! Holds the single-instance lock for the state directory, schedules the day if
//! nothing is pending, then polls the registry until SIGINT/SIGTERM/SIGHUP.

use anyhow::Result;

use super::AppContext;
use crate::alarm::daemon::Daemon;
use crate::io::lock::acquire_daemon_lock;
use crate::io::signals::setup_signal_handler;
use crate::logger::Log;

/// Handle `salatr run [--log <file>]`.
pub fn handle_run_command(log_file: Option<String>, debug_enabled: bool) -> Result<()> {
    // Keep the guard alive until the daemon exits so buffered lines are flushed
    let _log_guard = match log_file {
        Some(path) => Some(Log::start_file_logging(path)?),
        None => None,
    };

    log_version!();

    let ctx = AppContext::load()?;
    ctx.config.log_config();
    let request = ctx.config.schedule_request()?;
    Log::set_location_timezone(Some(request.timezone));

    let lock = match acquire_daemon_lock(ctx.state_dir())? {
        Ok(lock) => lock,
        Err(pid) => anyhow::bail!("salatr is already running (PID: {pid})"),
    };
    if debug_enabled {
        log_pipe!();
        log_debug!("Holding {}", lock.path().display());
    }

    let signals = setup_signal_handler()?;
    let daemon = Daemon::new(
        ctx.scheduler(),
        ctx.firing_handler(),
        ctx.voices.clone(),
        request,
        ctx.state_dir.clone(),
        ctx.clock.clone(),
        ctx.config.poll_interval(),
    );

    daemon.run(&signals.running)?;
    drop(lock);

    log_block_start!("Stopped");
    log_end!();
    Ok(())
}

/// Display help for the run command
pub fn display_help() {
    log_version!();
    log_block_start!("run - Fire alarms as they mature");
    log_block_start!("Usage: salatr run [--log <file>]");
    log_block_start!("Options:");
    log_indented!("--log <file>  Append output to <file> instead of the terminal");
    log_block_start!("Description:");
    log_indented!("Runs in the foreground, checking for due alarms every");
    log_indented!("poll_interval seconds. Each alarm is marked fired before it");
    log_indented!("plays, so a crash never repeats an adhan. After the last alarm");
    log_indented!("of the day the next day is scheduled automatically.");
    log_indented!("Only one daemon runs per configuration directory.");
    log_end!();
}
