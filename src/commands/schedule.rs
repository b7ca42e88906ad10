//! Implementation of the schedule command.
//!
//! Replaces the daily alarm set with the next occurrence of each of the six events.
//! With `--at` the run is a dry run against a scratch registry: the clock is pinned
//! to the given local time and nothing in the state directory changes.

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;

use super::AppContext;
use crate::alarm::{AlarmScheduler, FileAlarmRegistry, ScheduledAlarm};
use crate::constants::REGISTRY_FILE_NAME;
use crate::io::lock::ScheduleLock;
use crate::state::MemoryStore;
use crate::time_source::{self, FixedTimeSource, TimeSource, parse_datetime_in_tz};

/// Handle `salatr schedule [--at "YYYY-MM-DD HH:MM:SS"]`.
pub fn handle_schedule_command(at: Option<String>, debug_enabled: bool) -> Result<()> {
    log_version!();

    let config = crate::config::load()?;
    let request = config.schedule_request()?;

    // Pin the process clock before anything reads it, so log lines carry the simulated time
    if let Some(ref at) = at {
        let start = parse_datetime_in_tz(at, &request.timezone)
            .map_err(|e| anyhow::anyhow!(e))?
            .with_timezone(&Utc);
        time_source::init_time_source(Arc::new(FixedTimeSource::new(start)));
    }

    let ctx = AppContext::open(
        config,
        crate::state::ensure_state_dir()?,
        crate::state::get_voices_dir(),
        time_source::current(),
    )?;
    let selection = ctx.voices.active_selection();

    if debug_enabled {
        ctx.config.log_config();
    }

    let Some(at) = at else {
        let _lock = ScheduleLock::acquire(ctx.state_dir())?;
        let alarms = ctx
            .scheduler()
            .schedule_for_today(&request, &selection)
            .context("Failed to schedule prayer alarms")?;
        log_block_start!("Scheduled {} alarms", alarms.len());
        log_alarm_list(&alarms, request.timezone, ctx.clock.as_ref());
        log_end!();
        return Ok(());
    };

    let clock = ctx.clock.clone();
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    let scheduler = AlarmScheduler::new(
        Box::new(ctx.config.calculator()),
        Arc::new(FileAlarmRegistry::new(
            scratch.path().join(REGISTRY_FILE_NAME),
            clock.clone(),
        )),
        Arc::new(MemoryStore::new()),
        ctx.resolver.clone(),
        clock.clone(),
    );
    let alarms = scheduler.schedule_for_today(&request, &selection)?;

    log_block_start!("Dry run at {} ({})", at, request.timezone);
    log_indented!("Nothing was saved");
    log_block_start!("Would schedule {} alarms", alarms.len());
    log_alarm_list(&alarms, request.timezone, clock.as_ref());
    log_end!();
    Ok(())
}

/// One line per alarm: time, title, how long until it fires and what it will play.
pub(crate) fn log_alarm_list(alarms: &[ScheduledAlarm], tz: Tz, clock: &dyn TimeSource) {
    let now = clock.now();
    for alarm in alarms {
        let audio = alarm
            .payload
            .resolved_audio
            .as_ref()
            .map(|audio| audio.to_string())
            .unwrap_or_else(|| "notification only".to_string());
        log_indented!(
            "{}  {:<14} in {:<8} {}",
            alarm.firing_instant.with_timezone(&tz).format("%a %H:%M"),
            alarm.payload.title,
            super::format_remaining(alarm.firing_instant - now),
            audio
        );
    }
}

/// Display help for the schedule command
pub fn display_help() {
    log_version!();
    log_block_start!("schedule - Schedule the next six prayer alarms");
    log_block_start!("Usage: salatr schedule [--at \"YYYY-MM-DD HH:MM:SS\"]");
    log_block_start!("Options:");
    log_indented!("--at <time>  Dry run as if the local time were <time>");
    log_block_start!("Description:");
    log_indented!("Computes today's times for the configured location, moves every");
    log_indented!("event that already passed to tomorrow, and replaces the previous");
    log_indented!("daily alarms. Running it twice leaves exactly six alarms pending.");
    log_indented!("'salatr run' does this automatically when the day's alarms are spent.");
    log_block_start!("Examples:");
    log_indented!("salatr schedule");
    log_indented!("salatr schedule --at \"2024-03-15 13:00:00\"");
    log_end!();
}
