//! Implementation of the times command.
//!
//! Prints the six events for a date without touching any alarm state. Without a
//! date the listing is for today and marks the next upcoming event.

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::config;
use crate::prayer::PrayerTimeSource;

/// Handle `salatr times [YYYY-MM-DD]`.
pub fn handle_times_command(date: Option<String>, debug_enabled: bool) -> Result<()> {
    log_version!();

    let config = config::load()?;
    let request = config.schedule_request()?;
    if debug_enabled {
        config.log_config();
    }

    let now = crate::time_source::now();
    let date = match date {
        Some(ref text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{text}'. Use YYYY-MM-DD"))?,
        None => now.with_timezone(&request.timezone).date_naive(),
    };

    let times = config
        .calculator()
        .compute_times(date, request.latitude, request.longitude, request.method)?;

    log_block_start!(
        "Prayer times for {} ({})",
        date.format("%A %-d %B %Y"),
        times.timezone
    );
    log_indented!("Method: {}", times.method.description());

    let next = times.next_after(now).map(|event| event.prayer);

    for event in times.instants() {
        let marker = if Some(event.prayer) == next { "  <- next" } else { "" };
        log_indented!(
            "{:<8} {}{}",
            event.prayer.to_string(),
            event.instant.format("%H:%M"),
            marker
        );
    }
    log_end!();
    Ok(())
}

/// Display help for the times command
pub fn display_help() {
    log_version!();
    log_block_start!("times - Show prayer times");
    log_block_start!("Usage: salatr times [YYYY-MM-DD]");
    log_block_start!("Arguments:");
    log_indented!("[date]  Day to calculate (default: today at the configured location)");
    log_block_start!("Description:");
    log_indented!("Calculates Fajr, Sunrise, Dhuhr, Asr, Maghrib and Isha with the");
    log_indented!("configured method and madhab. Alarms are not changed.");
    log_block_start!("Examples:");
    log_indented!("salatr times");
    log_indented!("salatr times 2024-03-15");
    log_end!();
}
