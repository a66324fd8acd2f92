//! Builds and runs the external `ffmpeg` filter chain for one element.
//!
//! Grounded in `audio_processing/ffmpeg.py`: `areverse` when tempo is
//! negative, `asetrate`+`aresample`+`atempo` when pitch is nonzero (else the
//! tempo is folded into the player's own rate instead), then 0-or-1 `aecho`
//! preset. Filters chain in that order when more than one flag is set,
//! matching the original's unconditional `if` blocks.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::{DspSettings, VlcSettings};
use crate::error::{Error, Result};

const SOURCE_FRAME_RATE: f64 = 44100.0;

fn echo_args(in_gain: f64, out_gain: f64, delays: &[f64], decays: &[f64]) -> String {
    let delay_str = delays
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("|");
    let decay_str = decays
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("|");
    format!("aecho={in_gain}:{out_gain}:{delay_str}:{decay_str}")
}

/// The echo preset, as the exact gain/delay/decay tuples from the GLOSSARY.
fn echo_filter() -> String {
    echo_args(0.6, 0.3, &[100.0, 200.0, 300.0], &[0.5, 0.25, 0.125])
}

fn metal_filter() -> String {
    echo_args(0.8, 0.88, &[20.0, 40.0], &[0.8, 0.4])
}

fn reverb_filter() -> String {
    let delays: Vec<f64> = (1..32).map(|i| 8.0 * i as f64).collect();
    let decays: Vec<f64> = (1..32).map(|i| 0.95f64.powi(i)).collect();
    echo_args(0.8, 0.88, &delays, &decays)
}

/// Build the ordered `-filter:a` chain for `ffmpeg`, and the [`VlcSettings`]
/// fallback the player should apply in addition (or instead, if no ffmpeg
/// pass runs at all).
pub fn build_chain(settings: &DspSettings) -> (Vec<String>, VlcSettings) {
    let mut filters = Vec::new();
    let mut vlc_settings = VlcSettings::default();

    if settings.tempo_scale < 0.0 {
        filters.push("areverse".to_string());
    }

    if settings.pitch_shift != 0.0 {
        let pitch_scale = settings.pitch_scale();
        filters.push(format!("asetrate={}", SOURCE_FRAME_RATE * pitch_scale));
        filters.push(format!("aresample={SOURCE_FRAME_RATE}"));
        filters.push(format!("atempo={}", settings.tempo_scale.abs() / pitch_scale));
    } else {
        vlc_settings.tempo_scale = settings.tempo_scale.abs();
    }

    if settings.echo {
        filters.push(echo_filter());
    }
    if settings.metal {
        filters.push(metal_filter());
    }
    if settings.reverb {
        filters.push(reverb_filter());
    }

    (filters, vlc_settings)
}

/// Run `ffmpeg` over `source_path`, writing the filtered result to
/// `dest_path`. Must be called from a context that can block (the filter
/// subprocess is awaited directly here, but the caller runs this inside
/// `spawn_blocking`-equivalent isolation via its own task).
pub async fn process_audio(
    source_path: &Path,
    dest_path: &Path,
    settings: &DspSettings,
) -> Result<VlcSettings> {
    let (filters, vlc_settings) = build_chain(settings);

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y").arg("-i").arg(source_path);
    if !filters.is_empty() {
        cmd.arg("-filter:a").arg(filters.join(","));
    }
    cmd.arg(dest_path);

    let output = cmd
        .output()
        .await
        .map_err(|e| Error::download(format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        return Err(Error::download(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(vlc_settings)
}

/// Where the processed output for a resource should live.
pub fn processed_path(resource_dir: &Path) -> PathBuf {
    resource_dir.join("processed.wav")
}
