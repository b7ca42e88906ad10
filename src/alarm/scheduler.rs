//! Daily alarm scheduling.
//!
//! One scheduling run, for a date and a location:
//! 1. compute the six prayer times for the date
//! 2. roll every event at or before now forward by whole days
//! 3. cancel all previously scheduled daily alarms (failures are logged, not fatal)
//! 4. resolve audio for each prayer class from an explicit voice selection
//! 5. register six alarms, rolling back the ones already created if one fails
//! 6. persist the new ids as the daily alarm list
//!
//! The daily list is replaced wholesale, so after a successful run exactly six daily
//! alarms are pending no matter how many times scheduling ran before. Runs must not
//! overlap; callers hold [`crate::io::lock::ScheduleLock`] around them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use super::registry::AlarmRegistry;
use super::{AlarmNamespace, AlarmPayload, AlarmState, CancelOutcome, OneShotAlarm, ScheduledAlarm};
use crate::constants::{KEY_DAILY_ALARMS, KEY_TEST_ALARMS};
use crate::error::{CoreError, CoreResult};
use crate::prayer::{CalculationMethod, PrayerTimeSource, roll_forward};
use crate::state::KeyValueStore;
use crate::state::kv::{load_json, save_json};
use crate::time_source::TimeSource;
use crate::voice::{ActiveVoiceSelection, AudioRef, AudioResolver};

/// Where and how to schedule, as read from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub method: CalculationMethod,
    /// Zone whose calendar decides what "today" is.
    pub timezone: Tz,
}

pub struct AlarmScheduler {
    times: Box<dyn PrayerTimeSource + Send + Sync>,
    registry: Arc<dyn AlarmRegistry>,
    store: Arc<dyn KeyValueStore>,
    resolver: AudioResolver,
    clock: Arc<dyn TimeSource>,
}

impl AlarmScheduler {
    pub fn new(
        times: Box<dyn PrayerTimeSource + Send + Sync>,
        registry: Arc<dyn AlarmRegistry>,
        store: Arc<dyn KeyValueStore>,
        resolver: AudioResolver,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            times,
            registry,
            store,
            resolver,
            clock,
        }
    }

    pub fn registry(&self) -> &Arc<dyn AlarmRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &AudioResolver {
        &self.resolver
    }

    fn daily_ids(&self) -> Vec<String> {
        load_json(self.store.as_ref(), KEY_DAILY_ALARMS).unwrap_or_default()
    }

    fn test_ids(&self) -> Vec<String> {
        load_json(self.store.as_ref(), KEY_TEST_ALARMS).unwrap_or_default()
    }

    /// Replace all daily alarms with the six events of `date`, each moved to its next
    /// future occurrence.
    pub fn schedule_daily_alarms(
        &self,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        method: CalculationMethod,
        selection: &ActiveVoiceSelection,
    ) -> CoreResult<Vec<ScheduledAlarm>> {
        let times = self.times.compute_times(date, latitude, longitude, method)?;
        let upcoming = roll_forward(&times, self.clock.now());

        for outcome in self.cancel_ids(&self.daily_ids()) {
            if let CancelOutcome::Failed { id, reason } = outcome {
                log_warning!("Could not cancel previous alarm {}: {}", id, reason);
            }
        }

        let mut created: Vec<ScheduledAlarm> = Vec::with_capacity(upcoming.len());
        for event in upcoming {
            let audio = event
                .prayer
                .class()
                .map(|class| self.resolver.resolve(class, selection).audio);
            let payload = AlarmPayload::for_prayer(event.prayer, event.instant, audio);
            let tag = format!("{}-{}", event.prayer, event.instant.format("%Y-%m-%d"));
            let firing_instant = event.instant.with_timezone(&Utc);

            match self
                .registry
                .register(firing_instant, &tag, &payload, AlarmNamespace::Daily)
            {
                Ok(id) => created.push(ScheduledAlarm {
                    id,
                    tag,
                    firing_instant,
                    payload,
                }),
                Err(e) => {
                    log_error!("Failed to register {}: {}", tag, e);
                    self.roll_back(&created);
                    return Err(e);
                }
            }
        }

        let ids: Vec<String> = created.iter().map(|alarm| alarm.id.clone()).collect();
        if let Err(e) = save_json(self.store.as_ref(), KEY_DAILY_ALARMS, &ids) {
            self.roll_back(&created);
            return Err(e);
        }

        Ok(created)
    }

    /// Schedule today's alarms, where "today" is taken in the request's zone.
    pub fn schedule_for_today(
        &self,
        request: &ScheduleRequest,
        selection: &ActiveVoiceSelection,
    ) -> CoreResult<Vec<ScheduledAlarm>> {
        let today = self
            .clock
            .now()
            .with_timezone(&request.timezone)
            .date_naive();
        self.schedule_daily_alarms(
            today,
            request.latitude,
            request.longitude,
            request.method,
            selection,
        )
    }

    fn roll_back(&self, created: &[ScheduledAlarm]) {
        let ids: Vec<String> = created.iter().map(|alarm| alarm.id.clone()).collect();
        for outcome in self.cancel_ids(&ids) {
            if outcome.is_failure() {
                log_warning!("Rollback could not cancel {}", outcome.id());
            }
        }
        // The previous list was cancelled in full, so an empty list is the truth now
        if let Err(e) = self.store.remove(KEY_DAILY_ALARMS) {
            log_warning!("Could not clear the daily alarm list: {}", e);
        }
    }

    fn cancel_ids(&self, ids: &[String]) -> Vec<CancelOutcome> {
        ids.iter()
            .map(|id| match self.registry.cancel(id) {
                Ok(()) => CancelOutcome::Cancelled(id.clone()),
                Err(CoreError::AlarmNotFound(_)) => CancelOutcome::NotPending(id.clone()),
                Err(e) => CancelOutcome::Failed {
                    id: id.clone(),
                    reason: e.to_string(),
                },
            })
            .collect()
    }

    /// Cancel every daily alarm and clear the list. Test alarms are left alone.
    pub fn cancel_all_alarms(&self) -> CoreResult<Vec<CancelOutcome>> {
        let ids = self.daily_ids();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let outcomes = self.cancel_ids(&ids);
        self.store.remove(KEY_DAILY_ALARMS)?;
        Ok(outcomes)
    }

    /// Register a test alarm `delay_minutes` from now, in its own namespace.
    pub fn schedule_one_shot_alarm(
        &self,
        delay_minutes: i64,
        audio: Option<AudioRef>,
    ) -> CoreResult<OneShotAlarm> {
        if delay_minutes < 0 {
            return Err(CoreError::InvalidArgument(format!(
                "delay must not be negative (got {delay_minutes} minutes)"
            )));
        }
        let firing_instant = Duration::try_minutes(delay_minutes)
            .and_then(|delay| self.clock.now().checked_add_signed(delay))
            .ok_or_else(|| {
                CoreError::InvalidArgument(format!("delay of {delay_minutes} minutes is too large"))
            })?;
        let tag = format!("test-{}", firing_instant.format("%Y%m%dT%H%M%S"));

        let id = self.registry.register(
            firing_instant,
            &tag,
            &AlarmPayload::test(audio),
            AlarmNamespace::Test,
        )?;

        // Forget test alarms that are no longer pending
        let mut ids: Vec<String> = self
            .test_ids()
            .into_iter()
            .filter(|id| self.is_pending(id))
            .collect();
        ids.push(id.clone());
        save_json(self.store.as_ref(), KEY_TEST_ALARMS, &ids)?;

        Ok(OneShotAlarm { id, firing_instant })
    }

    fn is_pending(&self, id: &str) -> bool {
        self.registry
            .get(id)
            .is_some_and(|entry| entry.state == AlarmState::Pending)
    }

    fn pending_from(&self, ids: Vec<String>) -> Vec<ScheduledAlarm> {
        let mut alarms: Vec<ScheduledAlarm> = ids
            .into_iter()
            .filter_map(|id| self.registry.get(&id))
            .filter(|entry| entry.state == AlarmState::Pending)
            .map(|entry| entry.alarm)
            .collect();
        alarms.sort_by_key(|alarm| alarm.firing_instant);
        alarms
    }

    /// Daily alarms that have not fired yet, soonest first.
    pub fn pending_alarms(&self) -> Vec<ScheduledAlarm> {
        self.pending_from(self.daily_ids())
    }

    pub fn pending_test_alarms(&self) -> Vec<ScheduledAlarm> {
        self.pending_from(self.test_ids())
    }

    /// Earliest pending daily alarm at or after `after`.
    pub fn next_alarm(&self, after: DateTime<Utc>) -> Option<ScheduledAlarm> {
        self.pending_alarms()
            .into_iter()
            .find(|alarm| alarm.firing_instant >= after)
    }
}
