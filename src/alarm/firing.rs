//! What happens when an alarm matures: a notification, then the adhan.
//!
//! Playback goes through a single slot. Starting a new adhan first stops the one
//! in the slot, and the slot's mutex is held across the start, so two alarms firing
//! at once can never both be audible.
//!
//! The payload's audio may have become unplayable since scheduling (file deleted,
//! stream gone). Candidates are tried in order: payload audio, bundled file for the
//! class, remote fallback URL. Only when all fail is the alarm silent, and it is
//! still notified.

use rodio::{Decoder, OutputStream, Sink};
use std::fs;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::AlarmPayload;
use super::notify::Notifier;
use crate::error::{CoreError, CoreResult};
use crate::voice::{AudioRef, AudioResolver, Fetcher};

const PLAYBACK_POLL: Duration = Duration::from_millis(100);

/// A started playback that can be stopped.
pub trait PlaybackHandle: Send {
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

/// Something that can start playing an [`AudioRef`].
///
/// `start` returns only once the source is decoded and playing, so load failures
/// are reported synchronously and the caller can try the next candidate.
pub trait AudioBackend: Send + Sync {
    fn start(&self, source: &AudioRef) -> CoreResult<Box<dyn PlaybackHandle>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    Playing(AudioRef),
    /// No audio wanted: sunrise reminders, or playback disabled.
    NotifiedOnly,
    /// Every candidate failed to load.
    Silent,
}

pub struct FiringHandler {
    notifier: Box<dyn Notifier>,
    backend: Arc<dyn AudioBackend>,
    resolver: AudioResolver,
    notifications: bool,
    playback: bool,
    current: Mutex<Option<Box<dyn PlaybackHandle>>>,
}

impl FiringHandler {
    pub fn new(
        notifier: Box<dyn Notifier>,
        backend: Arc<dyn AudioBackend>,
        resolver: AudioResolver,
    ) -> Self {
        Self {
            notifier,
            backend,
            resolver,
            notifications: true,
            playback: true,
            current: Mutex::new(None),
        }
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications = enabled;
        self
    }

    pub fn with_playback(mut self, enabled: bool) -> Self {
        self.playback = enabled;
        self
    }

    /// Sources to try for `payload`, in order, without duplicates.
    pub fn playback_candidates(&self, payload: &AlarmPayload) -> Vec<AudioRef> {
        let Some(primary) = payload.resolved_audio.clone() else {
            return Vec::new();
        };
        let mut candidates = vec![primary];
        let bundled = payload
            .audio_class()
            .map(|class| self.resolver.bundled_path(class))
            .filter(|path| path.is_file())
            .map(AudioRef::local);
        for fallback in bundled
            .into_iter()
            .chain([AudioRef::remote(self.resolver.fallback_url())])
        {
            if !candidates.contains(&fallback) {
                candidates.push(fallback);
            }
        }
        candidates
    }

    pub fn on_fire(&self, payload: &AlarmPayload) -> FireOutcome {
        log_block_start!("Alarm: {}", payload.title);

        if self.notifications {
            let urgent = payload.prayer.is_some_and(|prayer| prayer.is_prayer());
            if let Err(e) = self.notifier.notify(&payload.title, &payload.body, urgent) {
                log_warning!("Notification failed: {}", e);
            }
        }

        if !self.playback || payload.resolved_audio.is_none() {
            return FireOutcome::NotifiedOnly;
        }

        let mut slot = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mut previous) = slot.take() {
            log_indented!("Stopping the adhan that is still playing");
            previous.stop();
        }

        for candidate in self.playback_candidates(payload) {
            match self.backend.start(&candidate) {
                Ok(handle) => {
                    log_indented!("Playing {}", candidate);
                    *slot = Some(handle);
                    return FireOutcome::Playing(candidate);
                }
                Err(e) => log_warning!("{}", e),
            }
        }

        log_error!("No playable adhan source for '{}'", payload.title);
        FireOutcome::Silent
    }

    pub fn is_playing(&self) -> bool {
        self.current
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|handle| handle.is_playing()))
            .unwrap_or(false)
    }

    /// Stop whatever is playing. Idempotent.
    pub fn stop(&self) {
        let mut slot = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mut handle) = slot.take() {
            handle.stop();
        }
    }
}

impl Drop for FiringHandler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Plays through the default output device with rodio.
///
/// `OutputStream` is not `Send`, so each playback owns a worker thread that opens
/// the device, plays, and closes it again.
pub struct RodioBackend {
    fetcher: Arc<dyn Fetcher>,
}

impl RodioBackend {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

fn load_error(source: &AudioRef, reason: impl ToString) -> CoreError {
    CoreError::AudioLoad {
        source_ref: source.to_string(),
        reason: reason.to_string(),
    }
}

/// Raw bytes of `source`, from disk or over the network.
fn read_source(source: &AudioRef, fetcher: &dyn Fetcher) -> CoreResult<Vec<u8>> {
    let bytes = match source {
        AudioRef::Local { path } => fs::read(path).map_err(|e| load_error(source, e))?,
        AudioRef::Remote { url } => fetcher.fetch(url).map_err(|e| load_error(source, e))?,
    };
    if bytes.is_empty() {
        return Err(load_error(source, "empty audio data"));
    }
    Ok(bytes)
}

fn open_and_play(source: &AudioRef, fetcher: &dyn Fetcher) -> CoreResult<(OutputStream, Sink)> {
    let bytes = read_source(source, fetcher)?;
    let decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| load_error(source, e))?;
    let (stream, handle) = OutputStream::try_default()
        .map_err(|e| load_error(source, format!("no audio output: {e}")))?;
    let sink = Sink::try_new(&handle).map_err(|e| load_error(source, e))?;
    sink.append(decoder);
    Ok((stream, sink))
}

impl AudioBackend for RodioBackend {
    fn start(&self, source: &AudioRef) -> CoreResult<Box<dyn PlaybackHandle>> {
        let (ready_tx, ready_rx) = mpsc::channel::<CoreResult<()>>();
        let stop = Arc::new(AtomicBool::new(false));
        let playing = Arc::new(AtomicBool::new(true));

        let worker_source = source.clone();
        let fetcher = self.fetcher.clone();
        let worker_stop = stop.clone();
        let worker_playing = playing.clone();

        let thread = thread::Builder::new()
            .name("salatr-adhan".to_string())
            .spawn(move || {
                match open_and_play(&worker_source, fetcher.as_ref()) {
                    Ok((_stream, sink)) => {
                        let _ = ready_tx.send(Ok(()));
                        while !worker_stop.load(Ordering::SeqCst) && !sink.empty() {
                            thread::sleep(PLAYBACK_POLL);
                        }
                        sink.stop();
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
                worker_playing.store(false, Ordering::SeqCst);
            })
            .map_err(|e| load_error(source, format!("cannot start playback thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(RodioPlayback {
                stop,
                playing,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(load_error(source, "playback thread exited"))
            }
        }
    }
}

struct RodioPlayback {
    stop: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackHandle for RodioPlayback {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::notify::MockNotifier;
    use crate::constants::BUNDLED_REGULAR_FILE;
    use crate::prayer::PrayerName;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use tempfile::{TempDir, tempdir};

    const FALLBACK: &str = "https://fallback.example/adhan.mp3";

    /// Records starts and tracks how many handles are live at once.
    #[derive(Default)]
    struct FakeBackend {
        failing: Vec<AudioRef>,
        started: Mutex<Vec<AudioRef>>,
        live: Arc<AtomicUsize>,
        max_live: Arc<AtomicUsize>,
    }

    struct FakePlayback {
        live: Arc<AtomicUsize>,
        stopped: bool,
    }

    impl PlaybackHandle for FakePlayback {
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

    impl AudioBackend for FakeBackend {
        fn start(&self, source: &AudioRef) -> CoreResult<Box<dyn PlaybackHandle>> {
            if self.failing.contains(source) {
                return Err(load_error(source, "unsupported format"));
            }
            self.started.lock().unwrap().push(source.clone());
            let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(now_live, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            Ok(Box::new(FakePlayback {
                live: self.live.clone(),
                stopped: false,
            }))
        }
    }

    fn quiet_notifier() -> Box<MockNotifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_, _, _| Ok(()));
        Box::new(notifier)
    }

    fn handler(backend: Arc<FakeBackend>, dir: &TempDir) -> FiringHandler {
        crate::logger::Log::set_enabled(false);
        let resolver = AudioResolver::new(dir.path().join("sounds"), dir.path().join("voices"), FALLBACK);
        FiringHandler::new(quiet_notifier(), backend, resolver)
    }

    fn dhuhr(audio: Option<AudioRef>) -> AlarmPayload {
        let at = chrono_tz::Asia::Riyadh
            .with_ymd_and_hms(2024, 3, 15, 12, 29, 0)
            .unwrap();
        AlarmPayload::for_prayer(PrayerName::Dhuhr, at, audio)
    }

    #[test]
    fn test_plays_payload_audio() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let handler = handler(backend.clone(), &dir);
        let audio = AudioRef::local("/voices/mine.mp3");

        assert_eq!(
            handler.on_fire(&dhuhr(Some(audio.clone()))),
            FireOutcome::Playing(audio)
        );
        assert!(handler.is_playing());
        handler.stop();
        assert!(!handler.is_playing());
        handler.stop();
    }

    #[test]
    fn test_falls_back_to_bundled_then_remote() {
        let dir = tempdir().unwrap();
        let sounds = dir.path().join("sounds");
        fs::create_dir_all(&sounds).unwrap();
        fs::write(sounds.join(BUNDLED_REGULAR_FILE), b"RIFF").unwrap();
        let broken = AudioRef::local("/voices/corrupt.mp3");
        let bundled = AudioRef::local(sounds.join(BUNDLED_REGULAR_FILE));

        let backend = Arc::new(FakeBackend {
            failing: vec![broken.clone(), bundled.clone()],
            ..Default::default()
        });
        let handler = handler(backend.clone(), &dir);

        assert_eq!(
            handler.playback_candidates(&dhuhr(Some(broken.clone()))),
            vec![broken.clone(), bundled, AudioRef::remote(FALLBACK)]
        );
        assert_eq!(
            handler.on_fire(&dhuhr(Some(broken))),
            FireOutcome::Playing(AudioRef::remote(FALLBACK))
        );
    }

    #[test]
    fn test_silent_when_everything_fails_but_still_notifies() {
        let dir = tempdir().unwrap();
        let audio = AudioRef::remote("https://gone.example/a.mp3");
        let backend = Arc::new(FakeBackend {
            failing: vec![audio.clone(), AudioRef::remote(FALLBACK)],
            ..Default::default()
        });
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_, _, _| Ok(()));
        let resolver = AudioResolver::new(dir.path().join("sounds"), dir.path().join("voices"), FALLBACK);
        let handler = FiringHandler::new(Box::new(notifier), backend, resolver);

        assert_eq!(handler.on_fire(&dhuhr(Some(audio))), FireOutcome::Silent);
        assert!(!handler.is_playing());
    }

    #[test]
    fn test_no_audio_only_notifies() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let handler = handler(backend.clone(), &dir);

        assert_eq!(handler.on_fire(&dhuhr(None)), FireOutcome::NotifiedOnly);
        assert!(backend.started.lock().unwrap().is_empty());
    }

    #[test]
    fn test_playback_disabled() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let handler = handler(backend.clone(), &dir).with_playback(false);

        let outcome = handler.on_fire(&dhuhr(Some(AudioRef::remote(FALLBACK))));
        assert_eq!(outcome, FireOutcome::NotifiedOnly);
        assert!(backend.started.lock().unwrap().is_empty());
    }

    #[test]
    fn test_notification_failure_does_not_block_playback() {
        let dir = tempdir().unwrap();
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_, _, _| Err(anyhow::anyhow!("no notification daemon")));
        let resolver = AudioResolver::new(dir.path().join("sounds"), dir.path().join("voices"), FALLBACK);
        let handler = FiringHandler::new(
            Box::new(notifier),
            Arc::new(FakeBackend::default()),
            resolver,
        );

        assert!(matches!(
            handler.on_fire(&dhuhr(Some(AudioRef::remote(FALLBACK)))),
            FireOutcome::Playing(_)
        ));
    }

    #[test]
    fn test_second_alarm_replaces_the_first() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let handler = handler(backend.clone(), &dir);

        handler.on_fire(&dhuhr(Some(AudioRef::local("/a.mp3"))));
        handler.on_fire(&dhuhr(Some(AudioRef::local("/b.mp3"))));

        assert_eq!(backend.live.load(Ordering::SeqCst), 1);
        assert_eq!(backend.started.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_fires_never_overlap() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let handler = Arc::new(handler(backend.clone(), &dir));

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let handler = handler.clone();
                thread::spawn(move || {
                    handler.on_fire(&dhuhr(Some(AudioRef::local(format!("/voice-{i}.mp3")))));
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(backend.max_live.load(Ordering::SeqCst), 1);
        assert_eq!(backend.live.load(Ordering::SeqCst), 1);
        handler.stop();
        assert_eq!(backend.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rodio_backend_reports_missing_file() {
        let mut fetcher = crate::voice::remote::MockFetcher::new();
        fetcher.expect_fetch().never();
        let backend = RodioBackend::new(Arc::new(fetcher));

        let result = backend.start(&AudioRef::local("/definitely/not/here.wav"));
        assert!(matches!(result, Err(CoreError::AudioLoad { .. })));
    }

    #[test]
    fn test_rodio_backend_reports_undecodable_stream() {
        let mut fetcher = crate::voice::remote::MockFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Ok(b"<html>not audio</html>".to_vec()));
        let backend = RodioBackend::new(Arc::new(fetcher));

        let result = backend.start(&AudioRef::remote("https://x.example/page"));
        assert!(matches!(result, Err(CoreError::AudioLoad { .. })));
    }
}
