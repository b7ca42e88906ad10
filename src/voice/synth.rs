//! Offline adhan-like tones rendered to 16-bit mono PCM WAV.
//!
//! Output is a pure function of the variant name: the four named variants have fixed
//! voicings, anything else is voiced from the SHA-256 digest of the name.

use std::f32::consts::TAU;

use crate::constants::SYNTH_SAMPLE_RATE;
use crate::error::{CoreError, CoreResult};

/// Parameters of one synthesized melody.
#[derive(Debug, Clone, PartialEq)]
pub struct Voicing {
    /// Frequency of the tonic, in Hz.
    pub base_hz: f32,
    /// Semitone offsets from the tonic, one per note.
    pub phrase: Vec<i32>,
    /// Relative amplitude of the 1st, 2nd and 3rd harmonics.
    pub harmonics: [f32; 3],
    pub vibrato_hz: f32,
    pub note_seconds: f32,
}

pub const KNOWN_VARIANTS: [&str; 4] = ["classic", "deep", "soft", "bright"];

/// Reject names that would not make a safe, stable file name.
pub fn validate_variant(variant: &str) -> CoreResult<()> {
    if variant.is_empty() || variant.len() > 32 {
        return Err(CoreError::InvalidArgument(
            "voice variant must be 1 to 32 characters".to_string(),
        ));
    }
    if !variant
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(CoreError::InvalidArgument(format!(
            "voice variant '{variant}' may only contain a-z, 0-9, '-' and '_'"
        )));
    }
    Ok(())
}

pub fn voicing_for(variant: &str) -> Voicing {
    match variant {
        "classic" => Voicing {
            base_hz: 220.0,
            phrase: vec![0, 2, 3, 5, 3, 2, 0],
            harmonics: [1.0, 0.5, 0.25],
            vibrato_hz: 5.0,
            note_seconds: 0.6,
        },
        "deep" => Voicing {
            base_hz: 146.83,
            phrase: vec![0, 3, 5, 3, 0],
            harmonics: [1.0, 0.7, 0.4],
            vibrato_hz: 4.0,
            note_seconds: 0.8,
        },
        "soft" => Voicing {
            base_hz: 261.63,
            phrase: vec![0, 2, 0, -2, 0],
            harmonics: [1.0, 0.2, 0.05],
            vibrato_hz: 4.5,
            note_seconds: 0.7,
        },
        "bright" => Voicing {
            base_hz: 329.63,
            phrase: vec![0, 4, 7, 4, 0, 7],
            harmonics: [1.0, 0.6, 0.45],
            vibrato_hz: 6.0,
            note_seconds: 0.5,
        },
        other => derived_voicing(other),
    }
}

fn derived_voicing(variant: &str) -> Voicing {
    let digest = sha256::digest(variant.as_bytes());
    let bytes: Vec<u8> = (0..digest.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&digest[i..i + 2], 16).ok())
        .collect();
    let byte = |i: usize| bytes.get(i).copied().unwrap_or(0);

    let notes = 4 + (byte(1) % 4) as usize;
    Voicing {
        base_hz: 130.0 + f32::from(byte(0)) * 0.8,
        phrase: (0..notes).map(|i| i32::from(byte(2 + i) % 8)).collect(),
        harmonics: [
            1.0,
            f32::from(byte(12)) / 255.0 * 0.7,
            f32::from(byte(13)) / 255.0 * 0.5,
        ],
        vibrato_hz: 3.0 + f32::from(byte(14) % 5),
        note_seconds: 0.45 + f32::from(byte(15) % 5) * 0.1,
    }
}

/// Render the voicing as signed 16-bit samples at [`SYNTH_SAMPLE_RATE`].
pub fn render(voicing: &Voicing) -> Vec<i16> {
    let rate = SYNTH_SAMPLE_RATE as f32;
    let per_note = (voicing.note_seconds * rate) as usize;
    let attack = (0.05 * rate) as usize;
    let release = (0.12 * rate) as usize;
    let norm: f32 = voicing.harmonics.iter().sum::<f32>().max(1.0);

    let mut samples = Vec::with_capacity(per_note * voicing.phrase.len());
    let mut phase = 0.0f32;
    for &offset in &voicing.phrase {
        let freq = voicing.base_hz * 2f32.powf(offset as f32 / 12.0);
        for n in 0..per_note {
            let t = n as f32 / rate;
            let vibrato = 1.0 + 0.006 * (TAU * voicing.vibrato_hz * t).sin();
            phase = (phase + TAU * freq * vibrato / rate) % TAU;

            let tone: f32 = voicing
                .harmonics
                .iter()
                .enumerate()
                .map(|(h, amp)| amp * (phase * (h as f32 + 1.0)).sin())
                .sum::<f32>()
                / norm;

            let envelope = if n < attack {
                n as f32 / attack as f32
            } else if n + release > per_note {
                (per_note - n) as f32 / release as f32
            } else {
                1.0
            };
            samples.push((tone * envelope * 0.8 * f32::from(i16::MAX)) as i16);
        }
    }
    samples
}

/// Minimal RIFF/WAVE container for mono PCM16.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let block_align: u16 = channels * (bits_per_sample / 8);
    let byte_rate: u32 = sample_rate * u32::from(block_align);
    let data_bytes: u32 = (samples.len() * usize::from(block_align)) as u32;

    let mut bytes = Vec::with_capacity(44 + data_bytes as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_bytes).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_bytes.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Complete WAV file for a variant.
pub fn synthesize_wav(variant: &str) -> CoreResult<Vec<u8>> {
    validate_variant(variant)?;
    let samples = render(&voicing_for(variant));
    Ok(encode_wav(&samples, SYNTH_SAMPLE_RATE))
}
