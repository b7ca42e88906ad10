use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Riyadh;
use chrono_tz::Tz;
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

use salatr::alarm::{AlarmRegistry, AlarmScheduler, AlarmState, FileAlarmRegistry};
use salatr::constants::KEY_DAILY_ALARMS;
use salatr::prayer::{
    CalculationMethod, Madhab, PrayerCalculator, PrayerName, PrayerTimeSource, PrayerTimes,
};
use salatr::state::kv::load_json;
use salatr::state::{KeyValueStore, MemoryStore};
use salatr::time_source::{FixedTimeSource, TimeSource};
use salatr::voice::{ActiveVoiceSelection, AudioResolver};
use salatr::CoreResult;

const MECCA: (f64, f64) = (21.4225, 39.8262);

/// Always answers with the same table, whatever date is asked for.
struct FixedTable(PrayerTimes);

impl PrayerTimeSource for FixedTable {
    fn compute_times(
        &self,
        _date: NaiveDate,
        _latitude: f64,
        _longitude: f64,
        _method: CalculationMethod,
    ) -> CoreResult<PrayerTimes> {
        Ok(self.0.clone())
    }
}

struct Fixture {
    scheduler: AlarmScheduler,
    registry: Arc<FileAlarmRegistry>,
    store: Arc<MemoryStore>,
    clock: Arc<FixedTimeSource>,
    _dir: TempDir,
}

fn fixture(
    times: Box<dyn PrayerTimeSource + Send + Sync>,
    now: DateTime<Utc>,
) -> Fixture {
    salatr::logger::Log::set_enabled(false);
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedTimeSource::new(now));
    let registry = Arc::new(FileAlarmRegistry::new(
        dir.path().join("alarms.json"),
        clock.clone(),
    ));
    let store = Arc::new(MemoryStore::new());
    let resolver = AudioResolver::new(
        dir.path().join("sounds"),
        dir.path().join("voices"),
        "https://fallback.example/adhan.mp3",
    );
    let scheduler = AlarmScheduler::new(
        times,
        registry.clone(),
        store.clone(),
        resolver,
        clock.clone(),
    );
    Fixture {
        scheduler,
        registry,
        store,
        clock,
        _dir: dir,
    }
}

fn riyadh(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    Riyadh.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn yesterday_table() -> PrayerTimes {
    PrayerTimes {
        date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
        timezone: Riyadh,
        method: CalculationMethod::UmmAlQura,
        fajr: riyadh(2024, 3, 14, 5, 1),
        sunrise: riyadh(2024, 3, 14, 6, 17),
        dhuhr: riyadh(2024, 3, 14, 12, 21),
        asr: riyadh(2024, 3, 14, 15, 45),
        maghrib: riyadh(2024, 3, 14, 18, 24),
        isha: riyadh(2024, 3, 14, 19, 54),
    }
}

#[test]
fn test_past_table_still_yields_six_future_alarms() {
    let now = riyadh(2024, 3, 15, 21, 0).with_timezone(&Utc);
    let f = fixture(Box::new(FixedTable(yesterday_table())), now);

    let alarms = f
        .scheduler
        .schedule_daily_alarms(
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            MECCA.0,
            MECCA.1,
            CalculationMethod::UmmAlQura,
            &ActiveVoiceSelection::default(),
        )
        .unwrap();

    assert_eq!(alarms.len(), 6);
    assert!(alarms.iter().all(|alarm| alarm.firing_instant > now));
    // Yesterday's 05:01 Fajr lands on the first 05:01 after 21:00 today
    let fajr = alarms
        .iter()
        .find(|alarm| alarm.payload.prayer == Some(PrayerName::Fajr))
        .unwrap();
    assert_eq!(fajr.firing_instant, riyadh(2024, 3, 16, 5, 1).with_timezone(&Utc));
    assert_eq!(fajr.tag, "Fajr-2024-03-16");
}

#[test]
fn test_scheduling_twice_leaves_six_pending() {
    let now = riyadh(2024, 3, 15, 13, 0).with_timezone(&Utc);
    let f = fixture(
        Box::new(PrayerCalculator::new(Madhab::Shafi, Some(Riyadh))),
        now,
    );
    let selection = ActiveVoiceSelection::default();

    let first = f
        .scheduler
        .schedule_daily_alarms(now.date_naive(), MECCA.0, MECCA.1, CalculationMethod::Default, &selection)
        .unwrap();
    let second = f
        .scheduler
        .schedule_daily_alarms(now.date_naive(), MECCA.0, MECCA.1, CalculationMethod::Default, &selection)
        .unwrap();

    assert_eq!(f.scheduler.pending_alarms().len(), 6);
    for alarm in &first {
        assert_eq!(
            f.registry.get(&alarm.id).unwrap().state,
            AlarmState::Cancelled
        );
    }
    for alarm in &second {
        assert_eq!(f.registry.get(&alarm.id).unwrap().state, AlarmState::Pending);
    }
}

#[test]
fn test_cancel_any_number_of_times_then_schedule() {
    let now = riyadh(2024, 3, 15, 13, 0).with_timezone(&Utc);
    let f = fixture(
        Box::new(PrayerCalculator::new(Madhab::Shafi, Some(Riyadh))),
        now,
    );
    let selection = ActiveVoiceSelection::default();
    let schedule = || {
        f.scheduler
            .schedule_daily_alarms(now.date_naive(), MECCA.0, MECCA.1, CalculationMethod::Default, &selection)
            .unwrap()
    };

    // Nothing scheduled yet
    assert!(f.scheduler.cancel_all_alarms().unwrap().is_empty());

    schedule();
    let outcomes = f.scheduler.cancel_all_alarms().unwrap();
    assert_eq!(outcomes.len(), 6);
    assert!(outcomes.iter().all(|outcome| !outcome.is_failure()));
    assert!(f.scheduler.cancel_all_alarms().unwrap().is_empty());
    assert!(f.store.get(KEY_DAILY_ALARMS).is_none());

    schedule();
    let ids: Vec<String> = load_json(f.store.as_ref(), KEY_DAILY_ALARMS).unwrap();
    assert_eq!(ids.len(), 6);
}

#[test]
fn test_mecca_roll_forward_between_dhuhr_and_asr() {
    let calculator = PrayerCalculator::new(Madhab::Shafi, None);
    let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let times = calculator
        .compute_times(date, MECCA.0, MECCA.1, CalculationMethod::Default)
        .unwrap();

    assert!(times.fajr < times.sunrise);
    assert!(times.sunrise < times.dhuhr);
    assert!(times.dhuhr < times.asr);
    assert!(times.asr < times.maghrib);
    assert!(times.maghrib < times.isha);

    let now = times.dhuhr.with_timezone(&Utc) + Duration::minutes(30);
    assert!(now < times.asr.with_timezone(&Utc));

    let f = fixture(Box::new(calculator), now);
    let alarms = f
        .scheduler
        .schedule_daily_alarms(date, MECCA.0, MECCA.1, CalculationMethod::Default, &ActiveVoiceSelection::default())
        .unwrap();

    let day_of = |prayer: PrayerName| {
        alarms
            .iter()
            .find(|alarm| alarm.payload.prayer == Some(prayer))
            .map(|alarm| alarm.firing_instant.with_timezone(&times.timezone).date_naive())
            .unwrap()
    };
    let tomorrow = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
    assert_eq!(day_of(PrayerName::Fajr), tomorrow);
    assert_eq!(day_of(PrayerName::Sunrise), tomorrow);
    assert_eq!(day_of(PrayerName::Dhuhr), tomorrow);
    assert_eq!(day_of(PrayerName::Asr), date);
    assert_eq!(day_of(PrayerName::Maghrib), date);
    assert_eq!(day_of(PrayerName::Isha), date);
}

#[test]
fn test_test_alarms_survive_daily_rescheduling() {
    let now = riyadh(2024, 3, 15, 13, 0).with_timezone(&Utc);
    let f = fixture(
        Box::new(PrayerCalculator::new(Madhab::Shafi, Some(Riyadh))),
        now,
    );

    let test_alarm = f.scheduler.schedule_one_shot_alarm(2, None).unwrap();
    f.scheduler
        .schedule_daily_alarms(now.date_naive(), MECCA.0, MECCA.1, CalculationMethod::Default, &ActiveVoiceSelection::default())
        .unwrap();
    f.scheduler.cancel_all_alarms().unwrap();

    assert_eq!(test_alarm.firing_instant, now + Duration::minutes(2));
    assert_eq!(f.scheduler.pending_test_alarms().len(), 1);

    f.clock.advance(Duration::minutes(2));
    let due = f.registry.due(f.clock.now());
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].alarm.id, test_alarm.id);
}

#[test]
fn test_invalid_location_schedules_nothing() {
    let now = riyadh(2024, 3, 15, 13, 0).with_timezone(&Utc);
    let f = fixture(
        Box::new(PrayerCalculator::new(Madhab::Shafi, Some(Riyadh))),
        now,
    );

    let result = f.scheduler.schedule_daily_alarms(
        now.date_naive(),
        95.0,
        0.0,
        CalculationMethod::Default,
        &ActiveVoiceSelection::default(),
    );
    assert!(result.is_err());
    assert!(f.scheduler.pending_alarms().is_empty());
}

fn instant_in_2024() -> impl Strategy<Value = DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp();
    (0i64..366 * 24 * 60).prop_map(move |minutes| {
        DateTime::from_timestamp(start + minutes * 60, 0).unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Whatever the moment and place, one run leaves one alarm per event. Events
    /// still ahead keep their computed instant; past ones move to the first
    /// same-time occurrence after now.
    #[test]
    fn test_schedule_invariants_hold_everywhere(
        now in instant_in_2024(),
        lat in -48.0f64..48.0,
        lon in -179.0f64..179.0,
    ) {
        let calculator = PrayerCalculator::new(Madhab::Shafi, None);
        let tz = calculator.timezone_for(lat, lon);
        let date = now.with_timezone(&tz).date_naive();
        let times = calculator
            .compute_times(date, lat, lon, CalculationMethod::Default)
            .unwrap();
        // Twilight may cross midnight; the daylight events never do below 48°
        for prayer in [PrayerName::Sunrise, PrayerName::Dhuhr, PrayerName::Asr, PrayerName::Maghrib] {
            prop_assert_eq!(times.get(prayer).date_naive(), date, "{} in {}", prayer, tz);
        }
        let f = fixture(Box::new(calculator), now);

        let alarms = f
            .scheduler
            .schedule_daily_alarms(date, lat, lon, CalculationMethod::Default, &ActiveVoiceSelection::default())
            .unwrap();

        prop_assert_eq!(alarms.len(), 6);
        for alarm in &alarms {
            let prayer = alarm.payload.prayer.unwrap();
            let computed = times.get(prayer).with_timezone(&Utc);
            prop_assert!(alarm.firing_instant > now);
            if computed > now {
                prop_assert_eq!(alarm.firing_instant, computed);
            } else {
                // A day is 23 to 25 hours around DST changes
                prop_assert!(alarm.firing_instant - Duration::hours(25) <= now);
            }
        }
        let mut prayers: Vec<PrayerName> =
            alarms.iter().filter_map(|alarm| alarm.payload.prayer).collect();
        prayers.sort();
        prop_assert_eq!(prayers, PrayerName::ALL.to_vec());

        // Re-running is idempotent in count
        f.scheduler
            .schedule_daily_alarms(date, lat, lon, CalculationMethod::Default, &ActiveVoiceSelection::default())
            .unwrap();
        prop_assert_eq!(f.scheduler.pending_alarms().len(), 6);
    }
}
