//! Configuration validation functionality.
//!
//! Rejects values that would make scheduling impossible or surprising: coordinates
//! off the globe, unknown calculation methods, time zones chrono-tz does not know,
//! and timings outside their supported ranges.

use anyhow::Result;
use chrono_tz::Tz;

use super::Config;
use crate::constants::*;
use crate::prayer::{CalculationMethod, Madhab};

/// Validate every field that is present. Missing fields take defaults later.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    if config.latitude.is_some() != config.longitude.is_some() {
        anyhow::bail!("latitude and longitude must be configured together");
    }

    if let Some(ref tz) = config.timezone
        && tz.parse::<Tz>().is_err()
    {
        anyhow::bail!(
            "timezone '{}' is not a known IANA time zone (e.g. \"Europe/London\")",
            tz
        );
    }

    if let Some(ref method) = config.method
        && CalculationMethod::from_name(method).is_none()
    {
        let known: Vec<&str> = CalculationMethod::ALL.iter().map(|m| m.as_str()).collect();
        anyhow::bail!(
            "method '{}' is not recognized. Use one of: {}",
            method,
            known.join(", ")
        );
    }

    if let Some(ref madhab) = config.madhab
        && Madhab::from_name(madhab).is_none()
    {
        anyhow::bail!("madhab must be \"shafi\" or \"hanafi\" (got \"{}\")", madhab);
    }

    if let Some(interval) = config.poll_interval
        && !(MINIMUM_POLL_INTERVAL..=MAXIMUM_POLL_INTERVAL).contains(&interval)
    {
        anyhow::bail!(
            "poll_interval ({} seconds) must be between {} and {} seconds",
            interval,
            MINIMUM_POLL_INTERVAL,
            MAXIMUM_POLL_INTERVAL
        );
    }

    if let Some(timeout) = config.download_timeout
        && !(MINIMUM_DOWNLOAD_TIMEOUT..=MAXIMUM_DOWNLOAD_TIMEOUT).contains(&timeout)
    {
        anyhow::bail!(
            "download_timeout ({} seconds) must be between {} and {} seconds",
            timeout,
            MINIMUM_DOWNLOAD_TIMEOUT,
            MAXIMUM_DOWNLOAD_TIMEOUT
        );
    }

    for (key, value) in [
        ("voice_list_url", &config.voice_list_url),
        ("fallback_audio_url", &config.fallback_audio_url),
    ] {
        if let Some(url) = value {
            validate_url(key, url)?;
        }
    }

    if let Some(ref dir) = config.sounds_dir
        && dir.trim().is_empty()
    {
        anyhow::bail!("sounds_dir must not be empty");
    }

    Ok(())
}

fn validate_url(key: &str, url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => anyhow::bail!("{} must be an http(s) URL (got \"{}\")", key, url),
    }
}
