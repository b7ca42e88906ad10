//! Picks exactly one playable audio reference for a prayer class.
//!
//! The fallback chain is the ordered array [`RESOLUTION_ORDER`]; each step either
//! yields a reference (after checking that a local file really exists) or passes.
//! The last step, the configured remote URL, always yields, so resolution never fails.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::ActiveVoiceSelection;
use crate::constants::{BUNDLED_DAWN_FILE, BUNDLED_REGULAR_FILE, SYNTH_PREFIX};
use crate::prayer::PrayerClass;

/// Where an alarm's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AudioRef {
    Local { path: PathBuf },
    Remote { url: String },
}

impl AudioRef {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        AudioRef::Local { path: path.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        AudioRef::Remote { url: url.into() }
    }
}

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioRef::Local { path } => write!(f, "{}", path.display()),
            AudioRef::Remote { url } => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    ActiveLocal,
    ActiveRemote,
    Bundled,
    Synthesized,
    RemoteFallback,
}

impl ResolutionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStep::ActiveLocal => "active voice (local)",
            ResolutionStep::ActiveRemote => "active voice (stream)",
            ResolutionStep::Bundled => "bundled adhan",
            ResolutionStep::Synthesized => "synthesized voice",
            ResolutionStep::RemoteFallback => "remote fallback",
        }
    }
}

pub const RESOLUTION_ORDER: [ResolutionStep; 5] = [
    ResolutionStep::ActiveLocal,
    ResolutionStep::ActiveRemote,
    ResolutionStep::Bundled,
    ResolutionStep::Synthesized,
    ResolutionStep::RemoteFallback,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub audio: AudioRef,
    pub step: ResolutionStep,
}

#[derive(Debug, Clone)]
pub struct AudioResolver {
    bundled_dir: PathBuf,
    voices_dir: PathBuf,
    fallback_url: String,
}

impl AudioResolver {
    pub fn new(
        bundled_dir: impl Into<PathBuf>,
        voices_dir: impl Into<PathBuf>,
        fallback_url: impl Into<String>,
    ) -> Self {
        Self {
            bundled_dir: bundled_dir.into(),
            voices_dir: voices_dir.into(),
            fallback_url: fallback_url.into(),
        }
    }

    pub fn bundled_path(&self, class: PrayerClass) -> PathBuf {
        let file = match class {
            PrayerClass::Regular => BUNDLED_REGULAR_FILE,
            PrayerClass::Dawn => BUNDLED_DAWN_FILE,
        };
        self.bundled_dir.join(file)
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    pub fn resolve(&self, class: PrayerClass, selection: &ActiveVoiceSelection) -> Resolution {
        let resolution = RESOLUTION_ORDER
            .iter()
            .find_map(|&step| {
                self.try_step(step, class, selection)
                    .map(|audio| Resolution { audio, step })
            })
            .unwrap_or_else(|| Resolution {
                audio: AudioRef::remote(&self.fallback_url),
                step: ResolutionStep::RemoteFallback,
            });

        if resolution.step == ResolutionStep::RemoteFallback {
            log_warning!(
                "AllLocalSourcesUnavailable: no local adhan for {} prayers, using {}",
                class,
                self.fallback_url
            );
        }
        resolution
    }

    fn try_step(
        &self,
        step: ResolutionStep,
        class: PrayerClass,
        selection: &ActiveVoiceSelection,
    ) -> Option<AudioRef> {
        let active = selection.for_class(class);
        match step {
            ResolutionStep::ActiveLocal => active
                .and_then(|record| record.local_path.as_deref())
                .filter(|path| path.is_file())
                .map(AudioRef::local),
            ResolutionStep::ActiveRemote => active
                .and_then(|record| record.source_url.as_deref())
                .map(AudioRef::remote),
            ResolutionStep::Bundled => {
                let path = self.bundled_path(class);
                path.is_file().then(|| AudioRef::local(path))
            }
            ResolutionStep::Synthesized => latest_synthesized(&self.voices_dir).map(AudioRef::local),
            ResolutionStep::RemoteFallback => Some(AudioRef::remote(&self.fallback_url)),
        }
    }
}

/// Most recently modified `synth-*.wav` in `dir`.
pub fn latest_synthesized(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(SYNTH_PREFIX) && name.ends_with(".wav")
        })
        .filter_map(|entry| {
            let modified = entry
                .metadata()
                .ok()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, entry.path()))
        })
        .filter(|(_, path)| path.is_file())
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{Applicability, VoiceRecord};
    use chrono::Utc;
    use std::fs::File;
    use tempfile::tempdir;

    fn record(local: Option<PathBuf>, url: Option<&str>) -> VoiceRecord {
        VoiceRecord {
            id: "v1".to_string(),
            display_name: "Voice".to_string(),
            local_path: local,
            source_url: url.map(str::to_string),
            applicability: Applicability::Both,
            created_at: Utc::now(),
        }
    }

    fn resolver(root: &Path) -> AudioResolver {
        AudioResolver::new(
            root.join("sounds"),
            root.join("voices"),
            "https://fallback.example/adhan.mp3",
        )
    }

    #[test]
    fn order_is_fixed() {
        assert_eq!(RESOLUTION_ORDER[0], ResolutionStep::ActiveLocal);
        assert_eq!(RESOLUTION_ORDER[4], ResolutionStep::RemoteFallback);
    }

    #[test]
    fn active_local_wins_when_file_exists() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("mine.mp3");
        File::create(&file).unwrap();
        let selection = ActiveVoiceSelection {
            regular: Some(record(Some(file.clone()), Some("https://x/y.mp3"))),
            dawn: None,
        };

        let resolution = resolver(dir.path()).resolve(PrayerClass::Regular, &selection);
        assert_eq!(resolution.step, ResolutionStep::ActiveLocal);
        assert_eq!(resolution.audio, AudioRef::local(file));
    }

    #[test]
    fn missing_local_file_falls_to_stream_url() {
        let dir = tempdir().unwrap();
        let selection = ActiveVoiceSelection {
            regular: None,
            dawn: Some(record(
                Some(dir.path().join("gone.mp3")),
                Some("https://x/y.mp3"),
            )),
        };

        let resolution = resolver(dir.path()).resolve(PrayerClass::Dawn, &selection);
        assert_eq!(resolution.step, ResolutionStep::ActiveRemote);
        assert_eq!(resolution.audio, AudioRef::remote("https://x/y.mp3"));
    }

    #[test]
    fn bundled_file_is_class_specific() {
        let dir = tempdir().unwrap();
        let sounds = dir.path().join("sounds");
        fs::create_dir_all(&sounds).unwrap();
        File::create(sounds.join(BUNDLED_DAWN_FILE)).unwrap();
        let resolver = resolver(dir.path());
        crate::logger::Log::set_enabled(false);

        let dawn = resolver.resolve(PrayerClass::Dawn, &ActiveVoiceSelection::default());
        assert_eq!(dawn.step, ResolutionStep::Bundled);
        assert_eq!(dawn.audio, AudioRef::local(sounds.join(BUNDLED_DAWN_FILE)));

        let regular = resolver.resolve(PrayerClass::Regular, &ActiveVoiceSelection::default());
        assert_eq!(regular.step, ResolutionStep::RemoteFallback);
    }

    #[test]
    fn synthesized_voice_before_remote_fallback() {
        let dir = tempdir().unwrap();
        let voices = dir.path().join("voices");
        fs::create_dir_all(&voices).unwrap();
        File::create(voices.join("synth-soft.wav")).unwrap();
        File::create(voices.join("download.mp3")).unwrap();

        let resolution =
            resolver(dir.path()).resolve(PrayerClass::Regular, &ActiveVoiceSelection::default());
        assert_eq!(resolution.step, ResolutionStep::Synthesized);
        assert_eq!(resolution.audio, AudioRef::local(voices.join("synth-soft.wav")));
    }

    #[test]
    fn nothing_local_means_remote_fallback() {
        crate::logger::Log::set_enabled(false);
        let dir = tempdir().unwrap();
        let resolution =
            resolver(dir.path()).resolve(PrayerClass::Dawn, &ActiveVoiceSelection::default());
        assert_eq!(resolution.step, ResolutionStep::RemoteFallback);
        assert_eq!(
            resolution.audio,
            AudioRef::remote("https://fallback.example/adhan.mp3")
        );
    }

    #[test]
    fn audio_ref_is_internally_tagged() {
        let json = serde_json::to_string(&AudioRef::remote("https://a/b.mp3")).unwrap();
        assert_eq!(json, r#"{"kind":"remote","url":"https://a/b.mp3"}"#);
        let back: AudioRef = serde_json::from_str(r#"{"kind":"local","path":"/x.wav"}"#).unwrap();
        assert_eq!(back, AudioRef::local("/x.wav"));
    }
}
