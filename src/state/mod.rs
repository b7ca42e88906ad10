//! Persistent state locations, following XDG Base Directory standards.
//!
//! Pending alarm ids, the voice index and active voice pointers live in the state
//! directory (`XDG_STATE_HOME/salatr/{namespace}`); audio files live in the data
//! directory (`XDG_DATA_HOME/salatr`). Keeping them apart from the config directory
//! means a config can be version controlled without dragging machine state along.

pub mod kv;

pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::get_custom_config_dir;
use crate::constants::APP_NAME;

fn xdg_home(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(fallback)
        })
}

/// Get the state directory for a given configuration directory.
///
/// State is stored in XDG_STATE_HOME/salatr/{namespace} where namespace is:
/// - "default" for the default config directory
/// - "custom_<hash>" for custom config directories (via --config)
pub fn get_state_dir(config_dir: Option<&Path>) -> Result<PathBuf> {
    let state_base = xdg_home("XDG_STATE_HOME", ".local/state").join(APP_NAME);

    let namespace = match config_dir {
        None => "default".to_string(),
        Some(path) => {
            let default_config = dirs::config_dir()
                .context("Could not determine config directory")?
                .join(APP_NAME);
            if path == default_config {
                "default".to_string()
            } else {
                get_state_namespace(path)
            }
        }
    };

    Ok(state_base.join(namespace))
}

/// Stable namespace for a custom config directory.
fn get_state_namespace(config_path: &Path) -> String {
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());

    let hash = sha256::digest(canonical.to_string_lossy().as_bytes());
    format!("custom_{}", &hash[..16])
}

/// Data directory holding `voices/` and `sounds/`.
pub fn get_data_dir() -> PathBuf {
    xdg_home("XDG_DATA_HOME", ".local/share").join(APP_NAME)
}

/// Downloaded and synthesized voice files.
pub fn get_voices_dir() -> PathBuf {
    get_data_dir().join("voices")
}

/// Default location of the bundled adhan files when the config does not name one.
pub fn get_default_sounds_dir() -> PathBuf {
    get_data_dir().join("sounds")
}

/// State directory for the active config, created if missing.
pub fn ensure_state_dir() -> Result<PathBuf> {
    let config_dir = get_custom_config_dir();
    let state_dir = get_state_dir(config_dir.as_deref())?;
    fs::create_dir_all(&state_dir)
        .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;
    Ok(state_dir)
}
