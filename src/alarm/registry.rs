//! Durable alarm registry.
//!
//! The registry is the system's "platform alarm service": it owns every alarm that
//! was ever registered, keyed by an opaque id, together with its namespace and state.
//! The daemon asks it which alarms are due; the scheduler registers and cancels.
//!
//! `FileAlarmRegistry` keeps everything in one JSON file. Each mutation takes an
//! `flock` on a sidecar lock file, re-reads, applies, and atomically replaces the
//! file, because the CLI and the daemon mutate it from different processes.

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{AlarmNamespace, AlarmPayload, AlarmState, ScheduledAlarm};
use crate::constants::REGISTRY_RETENTION_DAYS;
use crate::error::{CoreError, CoreResult};
use crate::state::kv::write_atomic;
use crate::time_source::TimeSource;

/// One registered alarm and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(flatten)]
    pub alarm: ScheduledAlarm,
    pub namespace: AlarmNamespace,
    pub state: AlarmState,
    pub updated_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
pub trait AlarmRegistry: Send + Sync {
    /// Register a pending alarm and return its new id.
    fn register(
        &self,
        firing_instant: DateTime<Utc>,
        tag: &str,
        payload: &AlarmPayload,
        namespace: AlarmNamespace,
    ) -> CoreResult<String>;

    /// Pending → Cancelled. `AlarmNotFound` if the id is unknown or not pending.
    fn cancel(&self, id: &str) -> CoreResult<()>;

    fn get(&self, id: &str) -> Option<RegistryEntry>;

    /// Pending alarms whose firing instant is at or before `now`, oldest first.
    fn due(&self, now: DateTime<Utc>) -> Vec<RegistryEntry>;

    /// Pending → Fired. `AlarmNotFound` if the id is unknown or not pending.
    fn mark_fired(&self, id: &str) -> CoreResult<()>;
}

type Entries = BTreeMap<String, RegistryEntry>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    alarms: Entries,
}

pub struct FileAlarmRegistry {
    path: PathBuf,
    clock: Arc<dyn TimeSource>,
    // Serializes mutations within this process; the flock covers other processes
    write_lock: Mutex<()>,
}

impl FileAlarmRegistry {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> CoreResult<Entries> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => {
                return Err(CoreError::StorageRead {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str::<RegistryFile>(&raw)
            .map(|file| file.alarms)
            .map_err(|e| CoreError::StorageRead {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Read for queries; a broken file reads as empty with a warning.
    fn read_lossy(&self) -> Entries {
        self.read().unwrap_or_else(|e| {
            log_warning!("{}", e);
            Entries::new()
        })
    }

    fn update<T>(&self, apply: impl FnOnce(&mut Entries) -> CoreResult<T>) -> CoreResult<T> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let lock_path = self.path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::storage_write(parent, e))?;
        }
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CoreError::storage_write(&lock_path, e))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| CoreError::storage_write(&lock_path, e))?;

        let result = self.update_locked(apply);
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn update_locked<T>(&self, apply: impl FnOnce(&mut Entries) -> CoreResult<T>) -> CoreResult<T> {
        let mut entries = self.read()?;
        let value = apply(&mut entries)?;

        let cutoff = self.clock.now() - Duration::days(REGISTRY_RETENTION_DAYS);
        entries.retain(|_, entry| !(entry.state.is_terminal() && entry.updated_at < cutoff));

        let json = serde_json::to_vec_pretty(&RegistryFile { alarms: entries })
            .map_err(|e| CoreError::InvalidArgument(format!("cannot encode registry: {e}")))?;
        write_atomic(&self.path, &json)?;
        Ok(value)
    }

    fn transition(&self, id: &str, next: AlarmState) -> CoreResult<()> {
        let now = self.clock.now();
        self.update(|entries| match entries.get_mut(id) {
            Some(entry) if entry.state.can_become(next) => {
                entry.state = next;
                entry.updated_at = now;
                Ok(())
            }
            _ => Err(CoreError::AlarmNotFound(id.to_string())),
        })
    }

    /// Every entry, for diagnostics.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.read_lossy().into_values().collect()
    }
}

impl AlarmRegistry for FileAlarmRegistry {
    fn register(
        &self,
        firing_instant: DateTime<Utc>,
        tag: &str,
        payload: &AlarmPayload,
        namespace: AlarmNamespace,
    ) -> CoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let entry = RegistryEntry {
            alarm: ScheduledAlarm {
                id: id.clone(),
                tag: tag.to_string(),
                firing_instant,
                payload: payload.clone(),
            },
            namespace,
            state: AlarmState::Pending,
            updated_at: self.clock.now(),
        };
        self.update(|entries| {
            entries.insert(id.clone(), entry);
            Ok(())
        })?;
        Ok(id)
    }

    fn cancel(&self, id: &str) -> CoreResult<()> {
        self.transition(id, AlarmState::Cancelled)
    }

    fn get(&self, id: &str) -> Option<RegistryEntry> {
        self.read_lossy().remove(id)
    }

    fn due(&self, now: DateTime<Utc>) -> Vec<RegistryEntry> {
        let mut due: Vec<RegistryEntry> = self
            .read_lossy()
            .into_values()
            .filter(|entry| entry.state == AlarmState::Pending && entry.alarm.firing_instant <= now)
            .collect();
        due.sort_by_key(|entry| entry.alarm.firing_instant);
        due
    }

    fn mark_fired(&self, id: &str) -> CoreResult<()> {
        self.transition(id, AlarmState::Fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::FixedTimeSource;
    use chrono::TimeZone;
    use tempfile::{TempDir, tempdir};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn registry() -> (FileAlarmRegistry, Arc<FixedTimeSource>, TempDir) {
        crate::logger::Log::set_enabled(false);
        let dir = tempdir().unwrap();
        let clock = Arc::new(FixedTimeSource::new(start()));
        let registry = FileAlarmRegistry::new(dir.path().join("alarms.json"), clock.clone());
        (registry, clock, dir)
    }

    fn register_in(registry: &FileAlarmRegistry, minutes: i64) -> String {
        registry
            .register(
                start() + Duration::minutes(minutes),
                "Dhuhr-2024-03-15",
                &AlarmPayload::test(None),
                AlarmNamespace::Daily,
            )
            .unwrap()
    }

    #[test]
    fn test_register_then_get() {
        let (registry, _, _dir) = registry();
        let id = register_in(&registry, 30);

        let entry = registry.get(&id).unwrap();
        assert_eq!(entry.state, AlarmState::Pending);
        assert_eq!(entry.alarm.tag, "Dhuhr-2024-03-15");
        assert_eq!(entry.namespace, AlarmNamespace::Daily);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let (registry, _, _dir) = registry();
        let a = register_in(&registry, 1);
        let b = register_in(&registry, 1);
        assert_ne!(a, b);
        assert_eq!(registry.entries().len(), 2);
    }

    #[test]
    fn test_due_only_returns_matured_pending_alarms() {
        let (registry, _, _dir) = registry();
        let late = register_in(&registry, 20);
        let early = register_in(&registry, 10);
        let future = register_in(&registry, 90);
        let cancelled = register_in(&registry, 5);
        registry.cancel(&cancelled).unwrap();

        let due: Vec<String> = registry
            .due(start() + Duration::minutes(30))
            .into_iter()
            .map(|entry| entry.alarm.id)
            .collect();
        assert_eq!(due, vec![early, late]);
        assert!(!due_contains(&registry, &future));
    }

    fn due_contains(registry: &FileAlarmRegistry, id: &str) -> bool {
        registry
            .due(start() + Duration::minutes(30))
            .iter()
            .any(|entry| entry.alarm.id == id)
    }

    #[test]
    fn test_alarm_due_exactly_now() {
        let (registry, _, _dir) = registry();
        let id = register_in(&registry, 0);
        assert_eq!(registry.due(start()).len(), 1);
        registry.mark_fired(&id).unwrap();
        assert!(registry.due(start()).is_empty());
    }

    #[test]
    fn test_transitions_happen_once() {
        let (registry, _, _dir) = registry();
        let id = register_in(&registry, 1);

        registry.mark_fired(&id).unwrap();
        assert!(matches!(
            registry.mark_fired(&id),
            Err(CoreError::AlarmNotFound(_))
        ));
        assert!(matches!(registry.cancel(&id), Err(CoreError::AlarmNotFound(_))));
        assert_eq!(registry.get(&id).unwrap().state, AlarmState::Fired);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let (registry, _, _dir) = registry();
        assert!(matches!(
            registry.cancel("nope"),
            Err(CoreError::AlarmNotFound(_))
        ));
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_old_terminal_entries_are_pruned() {
        let (registry, clock, _dir) = registry();
        let old = register_in(&registry, 1);
        registry.cancel(&old).unwrap();
        let pending = register_in(&registry, 60 * 24 * 30);

        clock.advance(Duration::days(REGISTRY_RETENTION_DAYS + 1));
        register_in(&registry, 60 * 24 * 30);

        assert!(registry.get(&old).is_none());
        assert!(registry.get(&pending).is_some());
    }

    #[test]
    fn test_state_survives_a_new_instance() {
        let (registry, clock, dir) = registry();
        let id = register_in(&registry, 1);

        let reopened = FileAlarmRegistry::new(dir.path().join("alarms.json"), clock);
        assert_eq!(reopened.get(&id), registry.get(&id));
    }

    #[test]
    fn test_corrupt_file_refuses_writes_but_reads_empty() {
        let (registry, _, _dir) = registry();
        fs::write(registry.path(), "{ not json").unwrap();

        assert!(registry.due(start()).is_empty());
        assert!(matches!(
            registry.register(start(), "x", &AlarmPayload::test(None), AlarmNamespace::Test),
            Err(CoreError::StorageRead { .. })
        ));
        // The broken file is left for the user to inspect
        assert_eq!(fs::read_to_string(registry.path()).unwrap(), "{ not json");
    }
}
