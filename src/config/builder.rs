//! Writing salatr.toml: the commented default file and in-place coordinate edits.
//!
//! The default file is rendered from a table of sections so that every inline
//! comment starts in one column. Coordinate edits rewrite only the two lines they
//! touch and keep the user's comments where they were.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::{get_config_path, private_path};
use crate::constants::*;
use crate::prayer::CalculationMethod;
use crate::prayer::solar::validate_coordinates;

/// Comment column used when a file has no inline comments to line up with.
const FALLBACK_COMMENT_COLUMN: usize = 25;

struct Setting {
    key: &'static str,
    value: String,
    note: String,
}

fn setting(key: &'static str, value: impl ToString, note: impl Into<String>) -> Setting {
    Setting {
        key,
        value: value.to_string(),
        note: note.into(),
    }
}

fn quoted(value: &str) -> String {
    format!("\"{value}\"")
}

/// Sections are TOML comments, not tables, so every key stays top-level.
fn render(sections: Vec<(&str, Vec<Setting>)>) -> String {
    let width = sections
        .iter()
        .flat_map(|(_, settings)| settings)
        .map(|s| s.key.len() + 3 + s.value.len())
        .max()
        .unwrap_or(0)
        + 1;

    let blocks: Vec<String> = sections
        .into_iter()
        .map(|(title, settings)| {
            let mut lines = vec![format!("#[{title}]")];
            lines.extend(settings.into_iter().map(|s| {
                format!("{:<width$}# {}", format!("{} = {}", s.key, s.value), s.note)
            }));
            lines.join("\n")
        })
        .collect();
    blocks.join("\n\n") + "\n"
}

fn geo_file_content(latitude: f64, longitude: f64) -> String {
    format!("#[Private geo coordinates]\nlatitude = {latitude:.6}\nlongitude = {longitude:.6}\n")
}

/// Write a commented default config at `path`.
///
/// Without `coords` the Kaaba stands in until the user runs `salatr location`. When
/// a geo.toml already sits next to `path`, coordinates go there and the main file
/// gets none.
pub fn create_default_config(path: &Path, coords: Option<(f64, f64)>) -> Result<()> {
    let dir = path
        .parent()
        .context("Config path has no parent directory")?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create {}", private_path(dir)))?;

    let (lat, lon) = coords.unwrap_or_else(|| {
        log_indented!("Using placeholder coordinates (Mecca)");
        log_indented!("Run 'salatr location <latitude> <longitude>' to set your own");
        (FALLBACK_LATITUDE, FALLBACK_LONGITUDE)
    });

    let geo_path = dir.join(GEO_FILE_NAME);
    let location = if geo_path.exists() {
        fs::write(&geo_path, geo_file_content(lat, lon))
            .with_context(|| format!("Cannot write {}", private_path(&geo_path)))?;
        log_indented!("Coordinates kept private in {}", private_path(&geo_path));
        Vec::new()
    } else {
        vec![
            setting("latitude", format!("{lat:.6}"), "Degrees north, -90 to 90"),
            setting("longitude", format!("{lon:.6}"), "Degrees east, -180 to 180"),
        ]
    };

    let methods: Vec<&str> = CalculationMethod::ALL.iter().map(|m| m.as_str()).collect();
    let content = render(vec![
        ("Location", location),
        (
            "Calculation",
            vec![
                setting("method", quoted(DEFAULT_METHOD), methods.join(", ")),
                setting("madhab", quoted(DEFAULT_MADHAB), "Asr shadow rule: \"shafi\" or \"hanafi\""),
            ],
        ),
        (
            "Alarms",
            vec![
                setting("notifications", DEFAULT_NOTIFICATIONS, "Desktop notification when an alarm fires"),
                setting("playback", DEFAULT_PLAYBACK, "Play the adhan when an alarm fires"),
                setting(
                    "poll_interval",
                    DEFAULT_POLL_INTERVAL,
                    format!("Seconds between checks in 'salatr run' ({MINIMUM_POLL_INTERVAL}-{MAXIMUM_POLL_INTERVAL})"),
                ),
            ],
        ),
        (
            "Audio",
            vec![
                setting("voice_list_url", quoted(DEFAULT_VOICE_LIST_URL), "Remote voice catalogue"),
                setting(
                    "fallback_audio_url",
                    quoted(DEFAULT_FALLBACK_AUDIO_URL),
                    "Played when no local adhan is available",
                ),
                setting(
                    "download_timeout",
                    DEFAULT_DOWNLOAD_TIMEOUT,
                    format!("Network timeout in seconds ({MINIMUM_DOWNLOAD_TIMEOUT}-{MAXIMUM_DOWNLOAD_TIMEOUT})"),
                ),
            ],
        ),
    ]);

    fs::write(path, content).with_context(|| format!("Cannot write {}", private_path(path)))?;
    Ok(())
}

/// Store new coordinates for the config in `config_dir`.
///
/// geo.toml takes them when present; otherwise the main file is edited in place.
pub fn update_coords_in_dir(config_dir: &Path, latitude: f64, longitude: f64) -> Result<()> {
    validate_coordinates(latitude, longitude)?;

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        anyhow::bail!("There is no config at {} to update", private_path(&config_path));
    }

    let geo_path = config_dir.join(GEO_FILE_NAME);
    let target = if geo_path.exists() {
        fs::write(&geo_path, geo_file_content(latitude, longitude))
            .with_context(|| format!("Cannot write {}", private_path(&geo_path)))?;
        geo_path
    } else {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Cannot read {}", private_path(&config_path)))?;
        let updated = set_keys(
            &content,
            &[
                ("latitude", format!("{latitude:.6}")),
                ("longitude", format!("{longitude:.6}")),
            ],
        );
        fs::write(&config_path, updated)
            .with_context(|| format!("Cannot write {}", private_path(&config_path)))?;
        config_path
    };

    log_block_start!("Location saved to {}", private_path(&target));
    log_indented!("Latitude:  {latitude:.6}");
    log_indented!("Longitude: {longitude:.6}");
    Ok(())
}

/// Store new coordinates for the active config.
pub fn update_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    let config_path = get_config_path()?;
    let config_dir = config_path
        .parent()
        .context("Config path has no parent directory")?;
    update_coords_in_dir(config_dir, latitude, longitude)
}

fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    trimmed.split_once('=').map(|(key, _)| key.trim())
}

/// The first uncommented `key = ...` line.
pub(crate) fn find_config_line(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .find(|line| line_key(line) == Some(key))
        .map(str::to_string)
}

/// Replace the value of each key, appending keys the file lacks.
///
/// Inline comments on the replaced lines move to one shared column.
fn set_keys(content: &str, pairs: &[(&str, String)]) -> String {
    let column = pairs
        .iter()
        .filter_map(|(key, _)| find_config_line(content, key))
        .filter_map(|line| line.find('#'))
        .max()
        .unwrap_or(FALLBACK_COMMENT_COLUMN);

    let mut missing: Vec<&(&str, String)> = pairs.iter().collect();
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            let Some(pos) = missing
                .iter()
                .position(|(key, _)| line_key(line) == Some(*key))
            else {
                return line.to_string();
            };
            let (key, value) = missing.remove(pos);
            let assignment = format!("{key} = {value}");
            match line.find('#') {
                Some(at) => {
                    let padding = column.saturating_sub(assignment.len()).max(1);
                    format!("{assignment}{}{}", " ".repeat(padding), &line[at..])
                }
                None => assignment,
            }
        })
        .collect();

    // Top-level keys may follow the comment-only sections
    lines.extend(missing.into_iter().map(|(key, value)| format!("{key} = {value}")));
    lines.join("\n") + "\n"
}
