//! Command-line command handlers for salatr.
//!
//! Each command lives in its own submodule. They all start from an [`AppContext`],
//! which wires the configuration to the on-disk stores so that the CLI and the
//! daemon see the same registry and voice index.

pub mod cancel;
pub mod fire;
pub mod help;
pub mod location;
pub mod run;
pub mod schedule;
pub mod status;
pub mod test;
pub mod times;
pub mod voices;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::alarm::firing::RodioBackend;
use crate::alarm::notify::default_notifier;
use crate::alarm::{AlarmScheduler, FileAlarmRegistry, FiringHandler};
use crate::config::{self, Config};
use crate::constants::{REGISTRY_FILE_NAME, STORE_FILE_NAME};
use crate::state::{self, JsonFileStore, KeyValueStore};
use crate::time_source::{self, TimeSource};
use crate::voice::{AudioResolver, Fetcher, HttpFetcher, VoiceStore};

/// Everything a command needs, built once from the loaded configuration.
pub struct AppContext {
    pub config: Config,
    pub state_dir: PathBuf,
    pub clock: Arc<dyn TimeSource>,
    pub store: Arc<dyn KeyValueStore>,
    pub registry: Arc<FileAlarmRegistry>,
    pub fetcher: Arc<dyn Fetcher>,
    pub voices: Arc<VoiceStore>,
    pub resolver: AudioResolver,
}

impl AppContext {
    /// Load the active config and open the stores in the XDG locations.
    pub fn load() -> Result<Self> {
        let config = config::load()?;
        let state_dir = state::ensure_state_dir()?;
        Self::open(config, state_dir, state::get_voices_dir(), time_source::current())
    }

    /// Open the stores under explicit directories.
    pub fn open(
        config: Config,
        state_dir: PathBuf,
        voices_dir: PathBuf,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&state_dir).with_context(|| {
            format!("Failed to create state directory {}", state_dir.display())
        })?;

        let store: Arc<dyn KeyValueStore> =
            Arc::new(JsonFileStore::open(state_dir.join(STORE_FILE_NAME))?);
        let registry = Arc::new(FileAlarmRegistry::new(
            state_dir.join(REGISTRY_FILE_NAME),
            clock.clone(),
        ));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.download_timeout()));
        let voices = Arc::new(VoiceStore::new(
            store.clone(),
            voices_dir.clone(),
            fetcher.clone(),
            config.voice_list_url(),
        ));
        let resolver = AudioResolver::new(
            config.sounds_dir(),
            voices_dir,
            config.fallback_audio_url(),
        );

        Ok(Self {
            config,
            state_dir,
            clock,
            store,
            registry,
            fetcher,
            voices,
            resolver,
        })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn scheduler(&self) -> AlarmScheduler {
        AlarmScheduler::new(
            Box::new(self.config.calculator()),
            self.registry.clone(),
            self.store.clone(),
            self.resolver.clone(),
            self.clock.clone(),
        )
    }

    /// Handler with the desktop notifier and the default audio device.
    pub fn firing_handler(&self) -> FiringHandler {
        FiringHandler::new(
            default_notifier(),
            Arc::new(RodioBackend::new(self.fetcher.clone())),
            self.resolver.clone(),
        )
        .with_notifications(self.config.notifications_enabled())
        .with_playback(self.config.playback_enabled())
    }
}

/// Format a signed duration as "3h 05m" for humans.
pub(crate) fn format_remaining(remaining: chrono::Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, m) => format!("{h}h {m:02}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::FixedTimeSource;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(chrono::Duration::minutes(7)), "7m");
        assert_eq!(format_remaining(chrono::Duration::minutes(185)), "3h 05m");
        assert_eq!(format_remaining(chrono::Duration::minutes(-3)), "0m");
    }

    #[test]
    fn test_context_opens_stores_in_state_dir() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(FixedTimeSource::new(
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
        ));
        let config = Config {
            latitude: Some(21.4225),
            longitude: Some(39.8262),
            timezone: Some("Asia/Riyadh".to_string()),
            ..Config::default()
        };

        let ctx = AppContext::open(
            config,
            dir.path().join("state"),
            dir.path().join("voices"),
            clock,
        )
        .unwrap();

        assert!(ctx.state_dir().is_dir());
        assert_eq!(ctx.registry.path(), dir.path().join("state").join("alarms.json"));
        assert!(ctx.scheduler().pending_alarms().is_empty());
    }
}
