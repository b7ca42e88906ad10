//! Prayer time calculation and the "next occurrence" logic built on top of it.
//!
//! ## Module Structure
//!
//! - [`method`]: the eight recognized calculation methods and the Asr madhab
//! - [`solar`]: sun position math and time zone lookup for coordinates
//! - [`times`]: the `PrayerTimeSource` seam, the built-in calculator and
//!   rolling elapsed events over to the next day
//!
//! Everything here is pure: a location, a date and a method go in, six instants come
//! out. Scheduling, storage and playback live in `alarm` and `voice`.

pub mod method;
pub mod solar;
pub mod times;

pub use method::{CalculationMethod, Madhab};
pub use times::{PrayerCalculator, PrayerTimeSource, roll_forward};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;


/// The six daily events, in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrayerName {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    pub const ALL: [PrayerName; 6] = [
        PrayerName::Fajr,
        PrayerName::Sunrise,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "Fajr",
            PrayerName::Sunrise => "Sunrise",
            PrayerName::Dhuhr => "Dhuhr",
            PrayerName::Asr => "Asr",
            PrayerName::Maghrib => "Maghrib",
            PrayerName::Isha => "Isha",
        }
    }

    /// Audio class of the event. Sunrise is not a prayer and has none.
    pub fn class(&self) -> Option<PrayerClass> {
        match self {
            PrayerName::Fajr => Some(PrayerClass::Dawn),
            PrayerName::Sunrise => None,
            _ => Some(PrayerClass::Regular),
        }
    }

    pub fn is_prayer(&self) -> bool {
        self.class().is_some()
    }
}

impl fmt::Display for PrayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping used to pick an adhan: Fajr has its own melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerClass {
    Regular,
    Dawn,
}

impl PrayerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerClass::Regular => "regular",
            PrayerClass::Dawn => "dawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regular" | "r" => Some(PrayerClass::Regular),
            "dawn" | "fajr" | "d" => Some(PrayerClass::Dawn),
            _ => None,
        }
    }
}

impl fmt::Display for PrayerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event at one absolute instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrayerInstant {
    pub prayer: PrayerName,
    pub instant: DateTime<Tz>,
}

/// The six instants for one calendar date at one location.
#[derive(Debug, Clone, PartialEq)]
pub struct PrayerTimes {
    pub date: NaiveDate,
    pub timezone: Tz,
    pub method: CalculationMethod,
    pub fajr: DateTime<Tz>,
    pub sunrise: DateTime<Tz>,
    pub dhuhr: DateTime<Tz>,
    pub asr: DateTime<Tz>,
    pub maghrib: DateTime<Tz>,
    pub isha: DateTime<Tz>,
}

impl PrayerTimes {
    pub fn get(&self, prayer: PrayerName) -> DateTime<Tz> {
        match prayer {
            PrayerName::Fajr => self.fajr,
            PrayerName::Sunrise => self.sunrise,
            PrayerName::Dhuhr => self.dhuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Maghrib => self.maghrib,
            PrayerName::Isha => self.isha,
        }
    }

    /// All six events in chronological order.
    pub fn instants(&self) -> [PrayerInstant; 6] {
        PrayerName::ALL.map(|prayer| PrayerInstant {
            prayer,
            instant: self.get(prayer),
        })
    }

    /// First event strictly after `now`, if any is left on this date.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<PrayerInstant> {
        self.instants().into_iter().find(|p| p.instant > now)
    }
}
