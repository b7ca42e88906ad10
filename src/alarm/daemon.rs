//! Alarm delivery loop.
//!
//! Every poll interval the daemon asks the registry which alarms have matured,
//! marks each one fired *before* firing it (so a crash mid-adhan never replays it),
//! then hands the payload to the [`FiringHandler`]. When no daily alarm is left
//! pending, typically right after Isha, the next day is scheduled automatically.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::firing::FiringHandler;
use super::registry::AlarmRegistry;
use super::scheduler::{AlarmScheduler, ScheduleRequest};
use crate::constants::DAEMON_SLEEP_SLICE;
use crate::error::CoreError;
use crate::io::lock::ScheduleLock;
use crate::time_source::TimeSource;
use crate::voice::VoiceStore;

/// What one polling pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub fired: usize,
    pub rescheduled: bool,
}

pub struct Daemon {
    scheduler: AlarmScheduler,
    registry: Arc<dyn AlarmRegistry>,
    handler: FiringHandler,
    voices: Arc<VoiceStore>,
    request: ScheduleRequest,
    state_dir: PathBuf,
    clock: Arc<dyn TimeSource>,
    poll_interval: Duration,
}

impl Daemon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: AlarmScheduler,
        handler: FiringHandler,
        voices: Arc<VoiceStore>,
        request: ScheduleRequest,
        state_dir: PathBuf,
        clock: Arc<dyn TimeSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry: scheduler.registry().clone(),
            scheduler,
            handler,
            voices,
            request,
            state_dir,
            clock,
            poll_interval,
        }
    }

    pub fn handler(&self) -> &FiringHandler {
        &self.handler
    }

    /// Schedule the next six events if none are pending.
    pub fn ensure_scheduled(&self) -> Result<bool> {
        if !self.scheduler.pending_alarms().is_empty() {
            return Ok(false);
        }
        let _lock = ScheduleLock::acquire(&self.state_dir)?;
        // Another process may have scheduled while we waited for the lock
        if !self.scheduler.pending_alarms().is_empty() {
            return Ok(false);
        }

        let alarms = self
            .scheduler
            .schedule_for_today(&self.request, &self.voices.active_selection())?;
        log_block_start!("Scheduled {} alarms", alarms.len());
        if let Some(next) = alarms.iter().min_by_key(|alarm| alarm.firing_instant) {
            log_indented!(
                "Next: {} at {}",
                next.tag,
                next.firing_instant
                    .with_timezone(&self.request.timezone)
                    .format("%Y-%m-%d %H:%M")
            );
        }
        Ok(true)
    }

    /// Fire everything that is due, then top up the schedule.
    pub fn tick(&self) -> Result<TickReport> {
        let mut report = TickReport::default();

        for entry in self.registry.due(self.clock.now()) {
            match self.registry.mark_fired(&entry.alarm.id) {
                Ok(()) => {
                    let outcome = self.handler.on_fire(&entry.alarm.payload);
                    log_debug!("{} -> {:?}", entry.alarm.tag, outcome);
                    report.fired += 1;
                }
                // Cancelled or fired by another process between due() and now
                Err(CoreError::AlarmNotFound(_)) => {}
                Err(e) => log_warning!("Could not mark {} as fired: {}", entry.alarm.tag, e),
            }
        }

        report.rescheduled = self.ensure_scheduled()?;
        Ok(report)
    }

    /// Poll until `running` is cleared. Playback is stopped on the way out.
    pub fn run(&self, running: &AtomicBool) -> Result<()> {
        log_block_start!(
            "Watching alarms every {}s",
            self.poll_interval.as_secs().max(1)
        );

        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.tick() {
                // Scheduling problems (bad location, unwritable state) are retried next poll
                log_error!("{:#}", e);
            }

            let mut slept = Duration::ZERO;
            while slept < self.poll_interval && running.load(Ordering::SeqCst) {
                let slice = DAEMON_SLEEP_SLICE.min(self.poll_interval - slept);
                self.clock.sleep(slice);
                slept += slice;
            }
        }

        self.handler.stop();
        Ok(())
    }
}
