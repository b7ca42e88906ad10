//! Implementation of the voices command: manage the adhan voice library.
//!
//! Voices are synthesized locally, downloaded from the remote catalogue for offline
//! use, or registered as stream-only URLs. One voice can be active per prayer
//! class; a class without one falls back to the bundled adhan.

use anyhow::{Context, Result};

use super::AppContext;
use crate::args::VoicesAction;
use crate::voice::VoiceRecord;

/// Handle `salatr voices <action>`.
pub fn handle_voices_command(action: VoicesAction, debug_enabled: bool) -> Result<()> {
    log_version!();

    let ctx = AppContext::load()?;
    let voices = &ctx.voices;

    match action {
        VoicesAction::List => {
            let records = voices.list_downloaded();
            if records.is_empty() {
                log_block_start!("No voices installed");
                log_indented!("Try 'salatr voices synthesize classic' or 'salatr voices remote'");
            } else {
                let selection = voices.active_selection();
                log_block_start!("Installed voices: {}", records.len());
                for record in &records {
                    let mut marks = Vec::new();
                    if selection.regular.as_ref().is_some_and(|r| r.id == record.id) {
                        marks.push("regular");
                    }
                    if selection.dawn.as_ref().is_some_and(|r| r.id == record.id) {
                        marks.push("dawn");
                    }
                    let active = if marks.is_empty() {
                        String::new()
                    } else {
                        format!(" [active: {}]", marks.join(", "))
                    };
                    log_indented!("{}{}", describe(record), active);
                }
            }
        }
        VoicesAction::Remote => {
            let remote = voices.list_remote();
            if remote.is_empty() {
                log_block_start!("The remote catalogue is empty or unreachable");
            } else {
                log_block_start!("Remote voices: {}", remote.len());
                for voice in &remote {
                    let installed = if voices.get(&voice.id).is_some() {
                        " (installed)"
                    } else {
                        ""
                    };
                    log_indented!("{:<20} {}{}", voice.id, voice.name, installed);
                }
                log_indented!("Install one with 'salatr voices download <id>'");
            }
        }
        VoicesAction::Synthesize { variant } => {
            let record = voices
                .synthesize(&variant)
                .with_context(|| format!("Failed to synthesize '{variant}'"))?;
            log_block_start!("Synthesized {}", record.id);
            log_indented!("{}", describe(&record));
        }
        VoicesAction::Download { id } => {
            let remote = voices
                .list_remote()
                .into_iter()
                .find(|voice| voice.id == id)
                .with_context(|| format!("No remote voice named '{id}'"))?;
            if debug_enabled {
                log_pipe!();
                log_debug!("Fetching {}", remote.preview_url);
            }
            match voices.download(&remote) {
                Some(record) => {
                    log_block_start!("Downloaded {}", record.id);
                    log_indented!("{}", describe(&record));
                }
                None => anyhow::bail!("Download of '{id}' failed; nothing was changed"),
            }
        }
        VoicesAction::Stream { id, name, url } => {
            let record = voices.add_stream(&id, &name, &url)?;
            log_block_start!("Added stream {}", record.id);
            log_indented!("{}", describe(&record));
            log_indented!("Streams need network access when the alarm fires");
        }
        VoicesAction::Remove { id } => {
            voices.remove(&id).with_context(|| format!("Failed to remove '{id}'"))?;
            log_block_start!("Removed {}", id);
        }
        VoicesAction::Use { class, id } => {
            voices.set_active(class, id.as_deref())?;
            match id {
                Some(id) => log_block_start!("{} prayers will use {}", class, id),
                None => log_block_start!("{} prayers will use the default adhan", class),
            }
            log_indented!("Run 'salatr schedule' to apply it to today's alarms");
        }
    }

    log_end!();
    Ok(())
}

fn describe(record: &VoiceRecord) -> String {
    let location = match (&record.local_path, &record.source_url) {
        (Some(path), _) => crate::config::private_path(path),
        (None, Some(url)) => format!("stream {url}"),
        (None, None) => "no source".to_string(),
    };
    let availability = if record.is_offline() { "offline" } else { "online" };
    format!(
        "{:<20} {:<24} {:<8} {}",
        record.id, record.display_name, availability, location
    )
}

/// Display help for the voices command
pub fn display_help() {
    log_version!();
    log_block_start!("voices - Manage adhan voices");
    log_block_start!("Usage: salatr voices <action>");
    log_block_start!("Actions:");
    log_indented!("list                        Installed voices (default)");
    log_indented!("remote                      Voices offered by the remote catalogue");
    log_indented!("synthesize <variant>        Render a voice locally (classic, deep, soft, bright, ...)");
    log_indented!("download <id>               Save a catalogue voice for offline use");
    log_indented!("stream <id> <name> <url>    Register a voice played from a URL");
    log_indented!("remove <id>                 Delete a voice");
    log_indented!("use <regular|dawn> <id|none> Choose the voice for a prayer class");
    log_block_start!("Examples:");
    log_indented!("salatr voices synthesize deep");
    log_indented!("salatr voices use dawn synth-deep");
    log_indented!("salatr voices use regular none");
    log_end!();
}
