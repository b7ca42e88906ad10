//! Daily prayer times and their next occurrences.
//!
//! `PrayerTimeSource` is the seam the scheduler depends on. `PrayerCalculator` is
//! the built-in implementation; tests substitute fixed tables.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use super::method::{CalculationMethod, IshaRule, Madhab};
use super::solar::{SunPath, determine_timezone_from_coordinates, validate_coordinates};
use super::{PrayerInstant, PrayerTimes};
use crate::error::{CoreError, CoreResult};

/// Coordinates + calendar date + method → six instants. Must be deterministic.
#[cfg_attr(test, mockall::automock)]
pub trait PrayerTimeSource {
    fn compute_times(
        &self,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        method: CalculationMethod,
    ) -> CoreResult<PrayerTimes>;
}

/// Conventional solar-angle calculator.
#[derive(Debug, Clone, Default)]
pub struct PrayerCalculator {
    madhab: Madhab,
    /// Civil zone for the results; looked up from the coordinates when unset.
    timezone: Option<Tz>,
}

impl PrayerCalculator {
    pub fn new(madhab: Madhab, timezone: Option<Tz>) -> Self {
        Self { madhab, timezone }
    }

    pub fn madhab(&self) -> Madhab {
        self.madhab
    }

    /// Zone results are expressed in for the given coordinates.
    pub fn timezone_for(&self, latitude: f64, longitude: f64) -> Tz {
        self.timezone
            .unwrap_or_else(|| determine_timezone_from_coordinates(latitude, longitude))
    }
}

/// Angle-based high latitude rule: the twilight may last at most `angle/60` of the night.
fn clamp_to_night_portion(
    time: Option<DateTime<Utc>>,
    base: DateTime<Utc>,
    angle: f64,
    night: Duration,
    morning: bool,
) -> DateTime<Utc> {
    let portion = Duration::milliseconds((night.num_milliseconds() as f64 * angle / 60.0) as i64);
    let limit = if morning { base - portion } else { base + portion };
    match time {
        Some(time) if morning && base - time <= portion => time,
        Some(time) if !morning && time - base <= portion => time,
        _ => limit,
    }
}

/// Drop seconds; a published time is never later than the event itself.
fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        - Duration::seconds(instant.second() as i64)
        - Duration::nanoseconds(instant.nanosecond() as i64)
}

/// The six events of one solar date, before they are tied to a civil date.
struct SolarTimes {
    fajr: DateTime<Utc>,
    sunrise: DateTime<Utc>,
    dhuhr: DateTime<Utc>,
    asr: DateTime<Utc>,
    maghrib: DateTime<Utc>,
    isha: DateTime<Utc>,
}

impl PrayerCalculator {
    fn solar_times(
        &self,
        solar_date: NaiveDate,
        latitude: f64,
        longitude: f64,
        method: CalculationMethod,
    ) -> CoreResult<SolarTimes> {
        let params = method.params();
        let path = SunPath::new(solar_date, latitude, longitude)?;

        let polar = || {
            CoreError::invalid_location(
                latitude,
                longitude,
                format!("the sun does not rise and set on {solar_date} at this latitude"),
            )
        };
        let sunrise = path.sunrise().ok_or_else(polar)?;
        let sunset = path.sunset().ok_or_else(polar)?;
        let asr = path.asr(self.madhab.shadow_factor()).ok_or_else(polar)?;
        let dhuhr = sunrise + (sunset - sunrise) / 2;

        let night = Duration::days(1) - (sunset - sunrise);
        let fajr = clamp_to_night_portion(
            path.depression(params.fajr_angle, true),
            sunrise,
            params.fajr_angle,
            night,
            true,
        );
        let isha = match params.isha {
            IshaRule::Angle(angle) => {
                clamp_to_night_portion(path.depression(angle, false), sunset, angle, night, false)
            }
            IshaRule::MinutesAfterMaghrib(minutes) => {
                sunset + Duration::seconds((minutes * 60.0) as i64)
            }
        };

        Ok(SolarTimes {
            fajr,
            sunrise,
            dhuhr,
            asr,
            maghrib: sunset,
            isha,
        })
    }
}

impl PrayerTimeSource for PrayerCalculator {
    fn compute_times(
        &self,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        method: CalculationMethod,
    ) -> CoreResult<PrayerTimes> {
        validate_coordinates(latitude, longitude)?;
        let tz = self.timezone_for(latitude, longitude);

        // Zones far from their longitude's solar time (Kiritimati, Samoa) see the
        // solar noon of `date` on a neighbouring civil day
        let mut solar = self.solar_times(date, latitude, longitude, method)?;
        let local_noon = solar.dhuhr.with_timezone(&tz).date_naive();
        if local_noon != date {
            let shifted = date + date.signed_duration_since(local_noon);
            solar = self.solar_times(shifted, latitude, longitude, method)?;
        }

        let at = |instant: DateTime<Utc>| truncate_to_minute(instant).with_timezone(&tz);

        Ok(PrayerTimes {
            date,
            timezone: tz,
            method,
            fajr: at(solar.fajr),
            sunrise: at(solar.sunrise),
            dhuhr: at(solar.dhuhr),
            asr: at(solar.asr),
            maghrib: at(solar.maghrib),
            isha: at(solar.isha),
        })
    }
}

/// Same wall-clock time one calendar day later in the instant's own zone.
///
/// A wall-clock time that does not exist on the next day (DST gap) moves by a plain
/// 24 hours instead.
pub fn same_time_next_day(instant: DateTime<Tz>) -> DateTime<Tz> {
    let tz = instant.timezone();
    let next = instant.naive_local() + Duration::days(1);
    tz.from_local_datetime(&next)
        .earliest()
        .unwrap_or_else(|| instant + Duration::days(1))
}

/// Move every event that is at or before `now` forward by whole days until it is in
/// the future. Events still ahead are left untouched.
pub fn roll_forward(times: &PrayerTimes, now: DateTime<Utc>) -> Vec<PrayerInstant> {
    times
        .instants()
        .into_iter()
        .map(|event| {
            let mut instant = event.instant;
            while instant <= now {
                instant = same_time_next_day(instant);
            }
            PrayerInstant {
                prayer: event.prayer,
                instant,
            }
        })
        .collect()
}
