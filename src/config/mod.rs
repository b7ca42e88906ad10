//! Configuration system for salatr with validation and geo.toml integration.
//!
//! Settings live in `salatr.toml` under `XDG_CONFIG_HOME/salatr/` (or the directory
//! given with `--config`). A freshly generated file looks like:
//!
//! ```toml
//! #[Location]
//! latitude = 21.422500                 # Geographic latitude (-90 to 90)
//! longitude = 39.826200                # Geographic longitude (use 'salatr location' to change)
//!
//! #[Calculation]
//! method = "default"                   # default, egyptian, karachi, umm_al_qura, dubai, north_america, kuwait, qatar
//! madhab = "shafi"                     # Asr shadow rule: "shafi" or "hanafi"
//!
//! #[Alarms]
//! notifications = true                 # Desktop notification when an alarm fires
//! playback = true                      # Play the adhan when an alarm fires
//! poll_interval = 5                    # Seconds between alarm checks in 'salatr run' (1-60)
//!
//! #[Audio]
//! voice_list_url = "https://..."       # Remote voice catalogue
//! fallback_audio_url = "https://..."   # Played when no local adhan is available
//! download_timeout = 20                # Network timeout in seconds (5-120)
//! ```
//!
//! Optional keys not written by default: `timezone` (IANA name, detected from the
//! coordinates when unset) and `sounds_dir` (bundled adhan files).
//!
//! A `geo.toml` next to `salatr.toml` overrides the coordinates, so the main file
//! can be shared or version controlled without revealing the user's location.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::Result;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::alarm::ScheduleRequest;
use crate::constants::*;
use crate::prayer::{CalculationMethod, Madhab, PrayerCalculator};

// Re-export public API
pub use builder::{create_default_config, update_coordinates};
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Coordinates kept apart from the main configuration.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct GeoConfig {
    pub(crate) latitude: Option<f64>,
    pub(crate) longitude: Option<f64>,
}

/// Settings loaded from `salatr.toml`.
///
/// Every field is optional in the file; [`loading`] fills in defaults after
/// validation so the accessors below never have to guess.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA zone name; detected from the coordinates when unset.
    pub timezone: Option<String>,

    pub method: Option<String>,
    pub madhab: Option<String>,

    pub notifications: Option<bool>,
    pub playback: Option<bool>,
    pub poll_interval: Option<u64>, // seconds

    /// Directory holding `adhan.wav` and `adhan_fajr.wav`.
    pub sounds_dir: Option<String>,
    pub voice_list_url: Option<String>,
    pub fallback_audio_url: Option<String>,
    pub download_timeout: Option<u64>, // seconds
}

/// Replace the home directory prefix with `~` for display.
pub(crate) fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        return format!("~/{}", rest.display());
    }
    path.display().to_string()
}

/// Expand a leading `~/` to the home directory.
fn expand_tilde(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}

impl Config {
    /// Get the path to the geo.toml file (in the same directory as salatr.toml)
    pub fn get_geo_path() -> Result<PathBuf> {
        Ok(loading::get_config_base_dir()?.join(GEO_FILE_NAME))
    }

    pub fn calculation_method(&self) -> CalculationMethod {
        CalculationMethod::from_name_or_default(self.method.as_deref().unwrap_or(DEFAULT_METHOD))
    }

    pub fn madhab(&self) -> Madhab {
        self.madhab
            .as_deref()
            .and_then(Madhab::from_name)
            .unwrap_or_default()
    }

    /// Configured zone, if any. Validation has already rejected unknown names.
    pub fn configured_timezone(&self) -> Option<Tz> {
        self.timezone.as_deref().and_then(|name| name.parse().ok())
    }

    pub fn calculator(&self) -> PrayerCalculator {
        PrayerCalculator::new(self.madhab(), self.configured_timezone())
    }

    pub fn coordinates(&self) -> Result<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok((lat, lon)),
            _ => anyhow::bail!(
                "No location configured. Run 'salatr location <latitude> <longitude>' first"
            ),
        }
    }

    /// Everything the scheduler needs to know about where and how.
    pub fn schedule_request(&self) -> Result<ScheduleRequest> {
        let (latitude, longitude) = self.coordinates()?;
        Ok(ScheduleRequest {
            latitude,
            longitude,
            method: self.calculation_method(),
            timezone: self.calculator().timezone_for(latitude, longitude),
        })
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.unwrap_or(DEFAULT_NOTIFICATIONS)
    }

    pub fn playback_enabled(&self) -> bool {
        self.playback.unwrap_or(DEFAULT_PLAYBACK)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL))
    }

    pub fn download_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT))
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.sounds_dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(crate::state::get_default_sounds_dir)
    }

    pub fn voice_list_url(&self) -> &str {
        self.voice_list_url
            .as_deref()
            .unwrap_or(DEFAULT_VOICE_LIST_URL)
    }

    pub fn fallback_audio_url(&self) -> &str {
        self.fallback_audio_url
            .as_deref()
            .unwrap_or(DEFAULT_FALLBACK_AUDIO_URL)
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");

        if let Ok(geo_path) = Self::get_geo_path()
            && geo_path.exists()
        {
            log_indented!("Loaded coordinates from geo.toml");
        }

        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            let lat_dir = if lat >= 0.0 { "N" } else { "S" };
            let lon_dir = if lon >= 0.0 { "E" } else { "W" };
            log_indented!(
                "Location: {:.3}°{}, {:.3}°{}",
                lat.abs(),
                lat_dir,
                lon.abs(),
                lon_dir
            );
            let tz = self.calculator().timezone_for(lat, lon);
            let source = if self.timezone.is_some() { "configured" } else { "detected" };
            log_indented!("Timezone: {} ({})", tz, source);
        }

        let method = self.calculation_method();
        log_indented!("Method: {} ({})", method, method.description());
        log_indented!("Madhab: {}", self.madhab().as_str());

        let on_off = |enabled: bool| if enabled { "on" } else { "off" };
        log_indented!(
            "Notifications: {}, adhan playback: {}",
            on_off(self.notifications_enabled()),
            on_off(self.playback_enabled())
        );
        log_indented!("Sounds: {}", private_path(&self.sounds_dir()));
    }
}
