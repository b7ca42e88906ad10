use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Riyadh;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use salatr::alarm::firing::{AudioBackend, PlaybackHandle};
use salatr::alarm::notify::LogNotifier;
use salatr::alarm::{AlarmScheduler, FileAlarmRegistry, FireOutcome, FiringHandler};
use salatr::constants::{BUNDLED_DAWN_FILE, BUNDLED_REGULAR_FILE};
use salatr::prayer::{CalculationMethod, Madhab, PrayerCalculator, PrayerClass, PrayerName};
use salatr::state::MemoryStore;
use salatr::time_source::FixedTimeSource;
use salatr::voice::{AudioRef, AudioResolver, Fetcher, RemoteVoice, ResolutionStep, VoiceStore};
use salatr::{CoreError, CoreResult};

const FALLBACK: &str = "https://fallback.example/adhan.mp3";

/// Every request fails as if the network were down.
struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> CoreResult<Vec<u8>> {
        Err(CoreError::network(url, "connection refused"))
    }
}

/// Plays local files that exist; remote sources play unless listed as broken.
#[derive(Default)]
struct CountingBackend {
    broken_urls: Vec<String>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    started: Mutex<Vec<AudioRef>>,
}

struct CountingPlayback {
    live: Arc<AtomicUsize>,
    stopped: bool,
}

impl PlaybackHandle for CountingPlayback {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_playing(&self) -> bool {
        !self.stopped
    }
}

impl AudioBackend for CountingBackend {
    fn start(&self, source: &AudioRef) -> CoreResult<Box<dyn PlaybackHandle>> {
        let playable = match source {
            AudioRef::Local { path } => path.is_file(),
            AudioRef::Remote { url } => !self.broken_urls.contains(url),
        };
        if !playable {
            return Err(CoreError::AudioLoad {
                source_ref: source.to_string(),
                reason: "not playable".to_string(),
            });
        }
        self.started.lock().unwrap().push(source.clone());
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        Ok(Box::new(CountingPlayback {
            live: self.live.clone(),
            stopped: false,
        }))
    }
}

struct Setup {
    voices: VoiceStore,
    resolver: AudioResolver,
    sounds: std::path::PathBuf,
    dir: TempDir,
}

fn setup() -> Setup {
    salatr::logger::Log::set_enabled(false);
    let dir = tempfile::tempdir().unwrap();
    let sounds = dir.path().join("sounds");
    let voices_dir = dir.path().join("voices");
    let voices = VoiceStore::new(
        Arc::new(MemoryStore::new()),
        &voices_dir,
        Arc::new(OfflineFetcher),
        "https://voices.example/list.json",
    );
    let resolver = AudioResolver::new(&sounds, &voices_dir, FALLBACK);
    Setup {
        voices,
        resolver,
        sounds,
        dir,
    }
}

fn write_bundled(sounds: &Path, file: &str) {
    fs::create_dir_all(sounds).unwrap();
    fs::write(sounds.join(file), b"RIFF....WAVE").unwrap();
}

#[test]
fn test_removed_voice_falls_back_to_bundled_adhan() {
    let s = setup();
    write_bundled(&s.sounds, BUNDLED_REGULAR_FILE);

    let record = s.voices.synthesize("deep").unwrap();
    s.voices
        .set_active(PrayerClass::Regular, Some(&record.id))
        .unwrap();

    let resolution = s
        .resolver
        .resolve(PrayerClass::Regular, &s.voices.active_selection());
    assert_eq!(resolution.step, ResolutionStep::ActiveLocal);
    assert_eq!(
        resolution.audio,
        AudioRef::local(record.local_path.clone().unwrap())
    );

    s.voices.remove(&record.id).unwrap();
    assert!(s.voices.get_active(PrayerClass::Regular).is_none());

    let resolution = s
        .resolver
        .resolve(PrayerClass::Regular, &s.voices.active_selection());
    assert_eq!(resolution.step, ResolutionStep::Bundled);
    assert_eq!(
        resolution.audio,
        AudioRef::local(s.sounds.join(BUNDLED_REGULAR_FILE))
    );
}

#[test]
fn test_dawn_class_prefers_its_own_bundled_file() {
    let s = setup();
    write_bundled(&s.sounds, BUNDLED_REGULAR_FILE);
    write_bundled(&s.sounds, BUNDLED_DAWN_FILE);

    let selection = s.voices.active_selection();
    assert_eq!(
        s.resolver.resolve(PrayerClass::Dawn, &selection).audio,
        AudioRef::local(s.sounds.join(BUNDLED_DAWN_FILE))
    );
    assert_eq!(
        s.resolver.resolve(PrayerClass::Regular, &selection).audio,
        AudioRef::local(s.sounds.join(BUNDLED_REGULAR_FILE))
    );
}

#[test]
fn test_offline_download_changes_nothing() {
    let s = setup();
    s.voices.synthesize("soft").unwrap();
    let before = s.voices.list_downloaded();

    let result = s.voices.download(&RemoteVoice {
        id: "makkah".to_string(),
        name: "Makkah".to_string(),
        preview_url: "https://voices.example/makkah.mp3".to_string(),
    });

    assert!(result.is_none());
    assert_eq!(s.voices.list_downloaded(), before);
    assert!(!s.dir.path().join("voices").join("makkah.mp3").exists());
    assert!(s.voices.list_remote().is_empty());
}

#[test]
fn test_alarm_scheduled_with_voice_plays_bundled_after_removal() {
    let s = setup();
    write_bundled(&s.sounds, BUNDLED_REGULAR_FILE);
    let record = s.voices.synthesize("deep").unwrap();
    s.voices
        .set_active(PrayerClass::Regular, Some(&record.id))
        .unwrap();

    let now = Riyadh
        .with_ymd_and_hms(2024, 3, 15, 9, 0, 0)
        .unwrap()
        .with_timezone(&Utc);
    let clock = Arc::new(FixedTimeSource::new(now));
    let scheduler = AlarmScheduler::new(
        Box::new(PrayerCalculator::new(Madhab::Shafi, Some(Riyadh))),
        Arc::new(FileAlarmRegistry::new(
            s.dir.path().join("alarms.json"),
            clock.clone(),
        )),
        Arc::new(MemoryStore::new()),
        s.resolver.clone(),
        clock,
    );
    let alarms = scheduler
        .schedule_daily_alarms(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            21.4225,
            39.8262,
            CalculationMethod::UmmAlQura,
            &s.voices.active_selection(),
        )
        .unwrap();

    let payload_of = |prayer: PrayerName| {
        alarms
            .iter()
            .find(|alarm| alarm.payload.prayer == Some(prayer))
            .map(|alarm| alarm.payload.clone())
            .unwrap()
    };
    let dhuhr = payload_of(PrayerName::Dhuhr);
    let synth_audio = AudioRef::local(record.local_path.clone().unwrap());
    assert_eq!(dhuhr.resolved_audio, Some(synth_audio));
    assert_eq!(payload_of(PrayerName::Sunrise).resolved_audio, None);

    // The voice disappears between scheduling and firing
    s.voices.remove(&record.id).unwrap();

    let backend = Arc::new(CountingBackend::default());
    let handler = FiringHandler::new(Box::new(LogNotifier), backend.clone(), s.resolver.clone());
    assert_eq!(
        handler.on_fire(&dhuhr),
        FireOutcome::Playing(AudioRef::local(s.sounds.join(BUNDLED_REGULAR_FILE)))
    );
    assert_eq!(
        handler.on_fire(&payload_of(PrayerName::Sunrise)),
        FireOutcome::NotifiedOnly
    );
    assert!(handler.is_playing());
    handler.stop();
    assert_eq!(backend.live.load(Ordering::SeqCst), 0);
}

#[test]
fn test_every_source_broken_is_silent() {
    let s = setup();
    let backend = Arc::new(CountingBackend {
        broken_urls: vec![FALLBACK.to_string()],
        ..Default::default()
    });
    let handler = FiringHandler::new(Box::new(LogNotifier), backend.clone(), s.resolver.clone());
    let audio = s
        .resolver
        .resolve(PrayerClass::Regular, &s.voices.active_selection())
        .audio;
    assert_eq!(audio, AudioRef::remote(FALLBACK));

    let payload = salatr::alarm::AlarmPayload::test(Some(audio));
    assert_eq!(handler.on_fire(&payload), FireOutcome::Silent);
    assert!(backend.started.lock().unwrap().is_empty());
}

#[test]
fn test_simultaneous_alarms_play_one_at_a_time() {
    let s = setup();
    write_bundled(&s.sounds, BUNDLED_REGULAR_FILE);
    let backend = Arc::new(CountingBackend::default());
    let handler = Arc::new(FiringHandler::new(
        Box::new(LogNotifier),
        backend.clone(),
        s.resolver.clone(),
    ));
    let at = Riyadh.with_ymd_and_hms(2024, 3, 15, 15, 45, 0).unwrap();

    let workers: Vec<_> = (0..12)
        .map(|i| {
            let handler = handler.clone();
            let audio = if i % 2 == 0 {
                AudioRef::remote(FALLBACK)
            } else {
                AudioRef::local(s.sounds.join(BUNDLED_REGULAR_FILE))
            };
            thread::spawn(move || {
                let payload =
                    salatr::alarm::AlarmPayload::for_prayer(PrayerName::Asr, at, Some(audio));
                handler.on_fire(&payload)
            })
        })
        .collect();
    for worker in workers {
        assert!(matches!(worker.join().unwrap(), FireOutcome::Playing(_)));
    }

    assert_eq!(backend.started.lock().unwrap().len(), 12);
    assert_eq!(backend.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(backend.live.load(Ordering::SeqCst), 1);
    handler.stop();
    assert_eq!(backend.live.load(Ordering::SeqCst), 0);
}
