//! Durable prayer alarms: scheduling, delivery and firing.
//!
//! ## Module Structure
//!
//! - [`registry`]: the `AlarmRegistry` seam and its JSON file implementation
//! - [`scheduler`]: turns one day of prayer times into exactly six pending alarms
//! - [`firing`]: notification plus single-slot audio playback when an alarm matures
//! - [`notify`]: desktop notifications over D-Bus, with a log fallback
//! - [`daemon`]: the polling loop that delivers matured alarms
//!
//! An alarm moves `Pending -> Fired` or `Pending -> Cancelled` and never back.

pub mod daemon;
pub mod firing;
pub mod notify;
pub mod registry;
pub mod scheduler;

pub use firing::{FireOutcome, FiringHandler};
pub use registry::{AlarmRegistry, FileAlarmRegistry, RegistryEntry};
pub use scheduler::{AlarmScheduler, ScheduleRequest};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::prayer::{PrayerClass, PrayerName};
use crate::voice::AudioRef;

/// Separate id spaces: daily scheduling never touches test alarms and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmNamespace {
    Daily,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Pending,
    Fired,
    Cancelled,
}

impl AlarmState {
    /// Only pending alarms move, and only once.
    pub fn can_become(self, next: AlarmState) -> bool {
        self == AlarmState::Pending && next != AlarmState::Pending
    }

    pub fn is_terminal(self) -> bool {
        self != AlarmState::Pending
    }
}

/// What the firing handler needs, carried inside the alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmPayload {
    /// `None` for one-shot test alarms.
    pub prayer: Option<PrayerName>,
    pub title: String,
    pub body: String,
    pub resolved_audio: Option<AudioRef>,
}

impl AlarmPayload {
    pub fn for_prayer(prayer: PrayerName, local: DateTime<Tz>, audio: Option<AudioRef>) -> Self {
        let time = local.format("%H:%M");
        let (title, body) = if prayer.is_prayer() {
            (
                format!("{prayer} prayer"),
                format!("It is time for {prayer} ({time})"),
            )
        } else {
            (
                prayer.to_string(),
                format!("Sunrise at {time}. The time for Fajr has ended"),
            )
        };
        Self {
            prayer: Some(prayer),
            title,
            body,
            resolved_audio: audio,
        }
    }

    pub fn test(audio: Option<AudioRef>) -> Self {
        Self {
            prayer: None,
            title: "Test alarm".to_string(),
            body: "This is a test of the adhan alarm".to_string(),
            resolved_audio: audio,
        }
    }

    /// Class used for playback fallbacks. Test alarms sound like a regular prayer.
    pub fn audio_class(&self) -> Option<PrayerClass> {
        match self.prayer {
            Some(prayer) => prayer.class(),
            None => Some(PrayerClass::Regular),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAlarm {
    pub id: String,
    /// `{prayer}-{YYYY-MM-DD}` of the adjusted instant.
    pub tag: String,
    pub firing_instant: DateTime<Utc>,
    pub payload: AlarmPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShotAlarm {
    pub id: String,
    pub firing_instant: DateTime<Utc>,
}

/// Result of cancelling one id in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled(String),
    /// Already fired, cancelled or pruned.
    NotPending(String),
    Failed { id: String, reason: String },
}

impl CancelOutcome {
    pub fn id(&self) -> &str {
        match self {
            CancelOutcome::Cancelled(id) | CancelOutcome::NotPending(id) => id,
            CancelOutcome::Failed { id, .. } => id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CancelOutcome::Failed { .. })
    }
}
