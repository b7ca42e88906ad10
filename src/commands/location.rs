//! Implementation of the location command.

use anyhow::Result;

use crate::config;
use crate::prayer::solar::determine_timezone_from_coordinates;

/// Handle `salatr location <latitude> <longitude>`.
///
/// Creates the config on first use, otherwise rewrites the coordinates in place
/// (or in geo.toml when one exists).
pub fn handle_location_command(latitude: f64, longitude: f64, debug_enabled: bool) -> Result<()> {
    log_version!();

    crate::prayer::solar::validate_coordinates(latitude, longitude)?;

    let config_path = config::get_config_path()?;
    if config_path.exists() {
        config::update_coordinates(latitude, longitude)?;
    } else {
        log_block_start!(
            "Creating config at {}",
            config::private_path(&config_path)
        );
        config::create_default_config(&config_path, Some((latitude, longitude)))?;
    }

    let loaded = config::load()?;
    let tz = loaded
        .configured_timezone()
        .unwrap_or_else(|| determine_timezone_from_coordinates(latitude, longitude));
    log_block_start!("Prayer times will use {}", tz);
    if debug_enabled {
        loaded.log_config();
    }
    log_indented!("Run 'salatr schedule' to move today's alarms to the new location");
    log_end!();
    Ok(())
}

/// Display help for the location command
pub fn display_help() {
    log_version!();
    log_block_start!("location - Set the coordinates used for prayer times");
    log_block_start!("Usage: salatr location <latitude> <longitude>");
    log_block_start!("Arguments:");
    log_indented!("<latitude>   Decimal degrees, north positive (-90 to 90)");
    log_indented!("<longitude>  Decimal degrees, east positive (-180 to 180)");
    log_block_start!("Description:");
    log_indented!("Writes the coordinates to salatr.toml, or to geo.toml when that");
    log_indented!("file exists so the main config can be shared without them.");
    log_block_start!("Examples:");
    log_indented!("salatr location 21.4225 39.8262");
    log_indented!("salatr location -33.8688 151.2093");
    log_end!();
}
