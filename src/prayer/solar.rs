//! Solar events for one day and time zone lookup.
//!
//! Event instants come from the `sunrise` crate. Events the sun never reaches on a
//! given day (polar day or night, twilight that never ends) come back as `None`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use sunrise::{Coordinates, SolarDay, SolarEvent};
use tzf_rs::DefaultFinder;

use crate::error::{CoreError, CoreResult};

static TZ_FINDER: Lazy<DefaultFinder> = Lazy::new(DefaultFinder::new);

/// Any real event lies within this distance of UTC noon on the solar date.
const EVENT_WINDOW_HOURS: i64 = 36;

/// Bisection steps for the noon altitude; far below a second of time.
const NOON_ALTITUDE_STEPS: usize = 48;

/// The sun's course over one date at one place.
pub struct SunPath {
    day: SolarDay,
    reference: DateTime<Utc>,
}

impl SunPath {
    pub fn new(date: NaiveDate, latitude: f64, longitude: f64) -> CoreResult<Self> {
        let coord = Coordinates::new(latitude, longitude).ok_or_else(|| {
            CoreError::invalid_location(latitude, longitude, "coordinates out of range")
        })?;
        Ok(Self {
            day: SolarDay::new(coord, date),
            reference: date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(12),
        })
    }

    /// An unreachable elevation yields a NaN hour angle, which the crate turns into
    /// the Unix epoch.
    fn event(&self, event: SolarEvent) -> Option<DateTime<Utc>> {
        let at = self.day.event_time(event);
        ((at - self.reference).num_hours().abs() <= EVENT_WINDOW_HOURS).then_some(at)
    }

    pub fn sunrise(&self) -> Option<DateTime<Utc>> {
        self.event(SolarEvent::Sunrise)
    }

    pub fn sunset(&self) -> Option<DateTime<Utc>> {
        self.event(SolarEvent::Sunset)
    }

    /// When the sun is `degrees` below the horizon, before noon if `morning`.
    pub fn depression(&self, degrees: f64, morning: bool) -> Option<DateTime<Utc>> {
        self.event(SolarEvent::Elevation {
            elevation: degrees.to_radians(),
            morning,
        })
    }

    /// Afternoon instant when a shadow is `factor` times its object plus the noon shadow.
    pub fn asr(&self, factor: f64) -> Option<DateTime<Utc>> {
        let noon = self.noon_altitude()?;
        let altitude = (1.0 / (factor + 1.0 / noon.tan())).atan();
        self.event(SolarEvent::Elevation {
            elevation: -altitude,
            morning: false,
        })
    }

    /// Highest altitude the sun reaches, in radians.
    ///
    /// Found as the largest elevation that still has an afternoon crossing.
    fn noon_altitude(&self) -> Option<f64> {
        let reachable = |altitude: f64| {
            self.event(SolarEvent::Elevation {
                elevation: -altitude,
                morning: false,
            })
            .is_some()
        };

        let (mut low, mut high) = (0.0_f64, std::f64::consts::FRAC_PI_2);
        if !reachable(low) {
            return None;
        }
        if reachable(high) {
            return Some(high);
        }
        for _ in 0..NOON_ALTITUDE_STEPS {
            let mid = (low + high) / 2.0;
            if reachable(mid) {
                low = mid;
            } else {
                high = mid;
            }
        }
        Some(low)
    }
}

/// IANA zone containing the coordinates, UTC for open water or unknown areas.
pub fn determine_timezone_from_coordinates(latitude: f64, longitude: f64) -> Tz {
    TZ_FINDER
        .get_tz_name(longitude, latitude)
        .parse::<Tz>()
        .unwrap_or(Tz::UTC)
}

/// Reject coordinates outside the geographic range.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> CoreResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(CoreError::invalid_location(
            latitude,
            longitude,
            "latitude must be between -90 and 90 degrees",
        ));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(CoreError::invalid_location(
            latitude,
            longitude,
            "longitude must be between -180 and 180 degrees",
        ));
    }
    Ok(())
}
