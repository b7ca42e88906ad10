//! Finding, reading and completing `salatr.toml`.
//!
//! The first `load` writes a default file so the daemon can start with no setup.
//! Coordinates from a sibling `geo.toml` win over the main file and are checked by
//! the same validation pass.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::validation::validate_config;
use super::{Config, GeoConfig, private_path};
use crate::constants::*;

/// `--config` directory for this process; `None` means the XDG location.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Record the `--config` directory. Only the first call succeeds.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Config directory was already chosen for this process"))
}

/// The `--config` directory, if the user gave one.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().cloned().flatten()
}

/// Directory holding salatr.toml and geo.toml.
pub fn get_config_base_dir() -> Result<PathBuf> {
    match get_custom_config_dir() {
        Some(dir) => Ok(dir),
        None => Ok(dirs::config_dir()
            .context("No XDG config directory for this user")?
            .join(APP_NAME)),
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_base_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the active config, writing the default file first if there is none.
pub fn load() -> Result<Config> {
    let path = get_config_path()?;

    if !path.exists() {
        log_block_start!("No config yet, writing defaults to {}", private_path(&path));
        super::builder::create_default_config(&path, None)
            .context("Could not write the default config")?;
    }

    load_from_path(&path)
        .with_context(|| format!("Invalid configuration in {}", private_path(&path)))
}

/// Load `path` exactly as written. A missing file is an error here.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", private_path(path)))?;
    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("{} is not valid TOML for salatr", private_path(path)))?;

    if let Some(geo) = path.parent().and_then(read_geo_file) {
        config.latitude = geo.latitude.or(config.latitude);
        config.longitude = geo.longitude.or(config.longitude);
    }

    validate_config(&config)?;
    fill_defaults(&mut config);
    Ok(config)
}

fn fill_defaults(config: &mut Config) {
    config.method.get_or_insert_with(|| DEFAULT_METHOD.to_string());
    config.madhab.get_or_insert_with(|| DEFAULT_MADHAB.to_string());
    config.notifications.get_or_insert(DEFAULT_NOTIFICATIONS);
    config.playback.get_or_insert(DEFAULT_PLAYBACK);
    config.poll_interval.get_or_insert(DEFAULT_POLL_INTERVAL);
    config.download_timeout.get_or_insert(DEFAULT_DOWNLOAD_TIMEOUT);
    config
        .voice_list_url
        .get_or_insert_with(|| DEFAULT_VOICE_LIST_URL.to_string());
    config
        .fallback_audio_url
        .get_or_insert_with(|| DEFAULT_FALLBACK_AUDIO_URL.to_string());
}

/// geo.toml next to the main file. Absent is silent; unreadable or malformed only
/// warns and leaves the main file's coordinates in place.
fn read_geo_file(config_dir: &Path) -> Option<GeoConfig> {
    let geo_path = config_dir.join(GEO_FILE_NAME);
    if !geo_path.exists() {
        return None;
    }

    let parsed = fs::read_to_string(&geo_path)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str::<GeoConfig>(&content).map_err(|e| e.to_string()));
    match parsed {
        Ok(geo) => Some(geo),
        Err(e) => {
            log_warning!("Ignoring {}: {}", GEO_FILE_NAME, e);
            None
        }
    }
}
