//! Voice catalogue: synthesized, downloaded and stream-only adhan voices.
//!
//! ## Module Structure
//!
//! - [`synth`]: deterministic offline tone synthesis to WAV
//! - [`remote`]: the `Fetcher` seam and the HTTP catalogue client
//! - [`resolver`]: the fallback chain turning an active selection into one `AudioRef`
//!
//! The index (`voices.index`) maps voice ids to records; two pointers
//! (`voices.active.regular` / `voices.active.dawn`) select one voice per prayer class.
//! File operations always complete before the index is rewritten, so a crash can
//! leave at most an orphaned file, never an index entry pointing at nothing that was
//! never written.

pub mod remote;
pub mod resolver;
pub mod synth;

pub use remote::{Fetcher, HttpFetcher, RemoteVoice};
pub use resolver::{AudioRef, AudioResolver, RESOLUTION_ORDER, Resolution, ResolutionStep};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::{KEY_ACTIVE_DAWN, KEY_ACTIVE_REGULAR, KEY_VOICE_INDEX, SYNTH_PREFIX};
use crate::error::{CoreError, CoreResult};
use crate::prayer::PrayerClass;
use crate::state::KeyValueStore;
use crate::state::kv::{load_json, save_json, write_atomic};

/// Which prayers a voice may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Applicability {
    Regular,
    Dawn,
    Both,
}

impl Applicability {
    pub fn applies_to(&self, class: PrayerClass) -> bool {
        matches!(
            (self, class),
            (Applicability::Both, _)
                | (Applicability::Regular, PrayerClass::Regular)
                | (Applicability::Dawn, PrayerClass::Dawn)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Applicability::Regular => "regular",
            Applicability::Dawn => "dawn",
            Applicability::Both => "both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceRecord {
    pub id: String,
    pub display_name: String,
    pub local_path: Option<PathBuf>,
    pub source_url: Option<String>,
    pub applicability: Applicability,
    pub created_at: DateTime<Utc>,
}

impl VoiceRecord {
    /// Stream-only records can play but are not guaranteed offline.
    pub fn is_offline(&self) -> bool {
        self.local_path.is_some()
    }
}

/// Snapshot of both active pointers, resolved to records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveVoiceSelection {
    pub regular: Option<VoiceRecord>,
    pub dawn: Option<VoiceRecord>,
}

impl ActiveVoiceSelection {
    pub fn for_class(&self, class: PrayerClass) -> Option<&VoiceRecord> {
        match class {
            PrayerClass::Regular => self.regular.as_ref(),
            PrayerClass::Dawn => self.dawn.as_ref(),
        }
    }
}

type VoiceIndex = BTreeMap<String, VoiceRecord>;

fn active_key(class: PrayerClass) -> &'static str {
    match class {
        PrayerClass::Regular => KEY_ACTIVE_REGULAR,
        PrayerClass::Dawn => KEY_ACTIVE_DAWN,
    }
}

fn validate_id(id: &str) -> CoreResult<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !id.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidArgument(format!(
            "voice id '{id}' may only contain letters, digits, '-', '_' and '.'"
        )))
    }
}

/// Extension for a downloaded file, taken from the URL when it looks like audio.
fn extension_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    ["mp3", "wav", "ogg", "flac"]
        .into_iter()
        .find(|ext| path.ends_with(&format!(".{ext}")))
        .unwrap_or("mp3")
}

pub struct VoiceStore {
    store: Arc<dyn KeyValueStore>,
    voices_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    list_url: String,
}

impl VoiceStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        voices_dir: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
        list_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            voices_dir: voices_dir.into(),
            fetcher,
            list_url: list_url.into(),
        }
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    fn index(&self) -> VoiceIndex {
        load_json(self.store.as_ref(), KEY_VOICE_INDEX).unwrap_or_default()
    }

    fn save_index(&self, index: &VoiceIndex) -> CoreResult<()> {
        save_json(self.store.as_ref(), KEY_VOICE_INDEX, index)
    }

    /// Render `variant` to `voices/synth-{variant}.wav` and index it. Re-synthesizing
    /// overwrites the file and refreshes the record.
    pub fn synthesize(&self, variant: &str) -> CoreResult<VoiceRecord> {
        let bytes = synth::synthesize_wav(variant)?;
        let id = format!("{SYNTH_PREFIX}{variant}");
        let path = self.voices_dir.join(format!("{id}.wav"));
        write_atomic(&path, &bytes)?;

        let record = VoiceRecord {
            id: id.clone(),
            display_name: format!("Synthesized ({variant})"),
            local_path: Some(path),
            source_url: None,
            applicability: Applicability::Both,
            created_at: crate::time_source::now(),
        };
        let mut index = self.index();
        index.insert(id, record.clone());
        self.save_index(&index)?;
        Ok(record)
    }

    /// Download a catalogue voice for offline use. `None` on any network or disk
    /// failure, with the index unchanged.
    pub fn download(&self, remote: &RemoteVoice) -> Option<VoiceRecord> {
        if let Err(e) = validate_id(&remote.id) {
            log_warning!("Skipping download: {}", e);
            return None;
        }

        let bytes = match self.fetcher.fetch(&remote.preview_url) {
            Ok(bytes) if bytes.is_empty() => {
                log_warning!("Download of '{}' returned an empty body", remote.id);
                return None;
            }
            Ok(bytes) => bytes,
            Err(e) => {
                log_warning!("Download of '{}' failed: {}", remote.id, e);
                return None;
            }
        };

        let path = self.voices_dir.join(format!(
            "{}.{}",
            remote.id,
            extension_from_url(&remote.preview_url)
        ));
        if let Err(e) = write_atomic(&path, &bytes) {
            log_warning!("Could not save voice '{}': {}", remote.id, e);
            return None;
        }

        let record = VoiceRecord {
            id: remote.id.clone(),
            display_name: remote.name.clone(),
            local_path: Some(path.clone()),
            source_url: Some(remote.preview_url.clone()),
            applicability: Applicability::Both,
            created_at: crate::time_source::now(),
        };
        let mut index = self.index();
        index.insert(record.id.clone(), record.clone());
        if let Err(e) = self.save_index(&index) {
            log_warning!("Could not index voice '{}': {}", remote.id, e);
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(record)
    }

    /// Voices offered by the remote catalogue; empty on any failure.
    pub fn list_remote(&self) -> Vec<RemoteVoice> {
        match self
            .fetcher
            .fetch(&self.list_url)
            .and_then(|bytes| remote::parse_voice_list(&bytes))
        {
            Ok(voices) => voices,
            Err(e) => {
                log_warning!("Could not load the remote voice list: {}", e);
                Vec::new()
            }
        }
    }

    /// Register a voice that is only ever streamed from `url`.
    pub fn add_stream(&self, id: &str, name: &str, url: &str) -> CoreResult<VoiceRecord> {
        validate_id(id)?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(CoreError::InvalidArgument(format!(
                "stream URL must be http(s): {url}"
            )));
        }
        let record = VoiceRecord {
            id: id.to_string(),
            display_name: name.to_string(),
            local_path: None,
            source_url: Some(url.to_string()),
            applicability: Applicability::Both,
            created_at: crate::time_source::now(),
        };
        let mut index = self.index();
        index.insert(record.id.clone(), record.clone());
        self.save_index(&index)?;
        Ok(record)
    }

    /// Delete a voice and any active pointer to it. Removing an unknown id succeeds.
    pub fn remove(&self, id: &str) -> CoreResult<()> {
        let mut index = self.index();

        if let Some(path) = index.get(id).and_then(|record| record.local_path.as_ref()) {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CoreError::storage_write(path, e)),
            }
        }

        if index.remove(id).is_some() {
            self.save_index(&index)?;
        }
        for class in [PrayerClass::Regular, PrayerClass::Dawn] {
            if self.store.get(active_key(class)).as_deref() == Some(id) {
                self.store.remove(active_key(class))?;
            }
        }
        Ok(())
    }

    /// Every indexed voice, ordered by id.
    pub fn list_downloaded(&self) -> Vec<VoiceRecord> {
        self.index().into_values().collect()
    }

    pub fn get(&self, id: &str) -> Option<VoiceRecord> {
        self.index().remove(id)
    }

    /// Point `class` at voice `id`, or clear the pointer with `None`.
    pub fn set_active(&self, class: PrayerClass, id: Option<&str>) -> CoreResult<()> {
        let Some(id) = id else {
            return self.store.remove(active_key(class));
        };
        let record = self
            .get(id)
            .ok_or_else(|| CoreError::InvalidArgument(format!("unknown voice '{id}'")))?;
        if !record.applicability.applies_to(class) {
            return Err(CoreError::InvalidArgument(format!(
                "voice '{id}' is for {} prayers only",
                record.applicability.as_str()
            )));
        }
        self.store.set(active_key(class), id)
    }

    /// Active record for `class`. A pointer to a voice that no longer exists reads
    /// as no selection.
    pub fn get_active(&self, class: PrayerClass) -> Option<VoiceRecord> {
        let id = self.store.get(active_key(class))?;
        self.get(&id)
    }

    pub fn active_selection(&self) -> ActiveVoiceSelection {
        ActiveVoiceSelection {
            regular: self.get_active(PrayerClass::Regular),
            dawn: self.get_active(PrayerClass::Dawn),
        }
    }
}
