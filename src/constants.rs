//! Application-wide constants: defaults, validation limits and storage names.

use std::time::Duration;

// # Calculation defaults
pub const DEFAULT_METHOD: &str = "default";
pub const DEFAULT_MADHAB: &str = "shafi";

// Coordinates used in a freshly generated config (Mecca)
pub const FALLBACK_LATITUDE: f64 = 21.4225;
pub const FALLBACK_LONGITUDE: f64 = 39.8262;

// # Behavior defaults
pub const DEFAULT_NOTIFICATIONS: bool = true;
pub const DEFAULT_PLAYBACK: bool = true;
pub const DEFAULT_DOWNLOAD_TIMEOUT: u64 = 20; // seconds
pub const DEFAULT_POLL_INTERVAL: u64 = 5; // seconds

pub const MINIMUM_DOWNLOAD_TIMEOUT: u64 = 5;
pub const MAXIMUM_DOWNLOAD_TIMEOUT: u64 = 120;
pub const MINIMUM_POLL_INTERVAL: u64 = 1;
pub const MAXIMUM_POLL_INTERVAL: u64 = 60;

// # Remote endpoints
pub const DEFAULT_VOICE_LIST_URL: &str =
    "https://raw.githubusercontent.com/salatr/voices/main/voices.json";
pub const DEFAULT_FALLBACK_AUDIO_URL: &str = "https://www.islamcan.com/audio/adhan/azan1.mp3";

// # Audio assets
pub const BUNDLED_REGULAR_FILE: &str = "adhan.wav";
pub const BUNDLED_DAWN_FILE: &str = "adhan_fajr.wav";
pub const SYNTH_PREFIX: &str = "synth-";
pub const SYNTH_SAMPLE_RATE: u32 = 22_050;

// # Durable store keys
pub const KEY_DAILY_ALARMS: &str = "alarms.daily";
pub const KEY_TEST_ALARMS: &str = "alarms.test";
pub const KEY_VOICE_INDEX: &str = "voices.index";
pub const KEY_ACTIVE_REGULAR: &str = "voices.active.regular";
pub const KEY_ACTIVE_DAWN: &str = "voices.active.dawn";

// # File names
pub const CONFIG_FILE_NAME: &str = "salatr.toml";
pub const GEO_FILE_NAME: &str = "geo.toml";
pub const STORE_FILE_NAME: &str = "store.json";
pub const REGISTRY_FILE_NAME: &str = "alarms.json";
pub const SCHEDULE_LOCK_NAME: &str = "schedule.lock";
pub const DAEMON_LOCK_NAME: &str = "daemon.lock";

/// Terminal registry entries older than this are dropped on save.
pub const REGISTRY_RETENTION_DAYS: i64 = 7;

/// Granularity of the daemon's sleep so shutdown signals are noticed quickly.
pub const DAEMON_SLEEP_SLICE: Duration = Duration::from_millis(250);

pub const APP_NAME: &str = "salatr";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
