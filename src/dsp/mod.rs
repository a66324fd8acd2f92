//! DSP settings and the ffmpeg filter chain they imply.

pub mod filters;

use serde::{Deserialize, Serialize};

/// Flat record of the transforms requested for one queued element.
///
/// Named `loop_playback` rather than `loop` because the latter is a Rust
/// keyword.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DspSettings {
    /// Semitones, domain `[-24, 24]`. Domain is enforced by the parser, not
    /// here, so a `DspSettings` built directly in tests can exercise
    /// out-of-domain values if needed.
    pub pitch_shift: f64,
    /// `|tempo_scale| ∈ [0.25, 4]`; negative plays the source reversed.
    pub tempo_scale: f64,
    pub echo: bool,
    pub metal: bool,
    pub reverb: bool,
    pub loop_playback: bool,
}

impl Default for DspSettings {
    fn default() -> Self {
        Self {
            pitch_shift: 0.0,
            tempo_scale: 1.0,
            echo: false,
            metal: false,
            reverb: false,
            loop_playback: false,
        }
    }
}

impl DspSettings {
    /// `2^(pitch_shift/12)`, the ratio ffmpeg's `asetrate` multiplies the
    /// sample rate by to achieve the requested pitch shift.
    pub fn pitch_scale(&self) -> f64 {
        2f64.powf(self.pitch_shift / 12.0)
    }

    /// Whether this element's download must be routed through the external
    /// filter pipeline at all, vs. just fed to the player at a bare rate.
    ///
    /// A *positive* tempo alone does not require ffmpeg: `build_chain` folds
    /// a bare positive tempo scale into [`VlcSettings`] instead of an
    /// `atempo` filter. A negative tempo still needs the subprocess pass
    /// for `areverse` — the player has no reverse-playback rate to fall
    /// back on.
    pub fn requires_ffmpeg(&self) -> bool {
        self.pitch_shift != 0.0 || self.tempo_scale < 0.0 || self.echo || self.metal || self.reverb
    }

    /// `bool(settings)` from the original: true if this element asks for
    /// any transform at all, including a bare loop with no other effect.
    pub fn is_nontrivial(&self) -> bool {
        self.requires_ffmpeg() || self.loop_playback
    }

    /// Nightcore preset: `pitch = 12·log2(1.35)`, `tempo = 1.35`.
    pub fn nightcore() -> (f64, f64) {
        (12.0 * 1.35f64.log2(), 1.35)
    }
}

/// The player-side fallback rate applied when ffmpeg doesn't need to run
/// (or after it has, for anything it didn't already bake in).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VlcSettings {
    pub tempo_scale: f64,
}

impl Default for VlcSettings {
    fn default() -> Self {
        Self { tempo_scale: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_trivial() {
        let settings = DspSettings::default();
        assert!(!settings.requires_ffmpeg());
        assert!(!settings.is_nontrivial());
        assert_eq!(settings.pitch_scale(), 1.0);
    }

    #[test]
    fn test_loop_alone_is_nontrivial_but_not_ffmpeg() {
        let settings = DspSettings {
            loop_playback: true,
            ..Default::default()
        };
        assert!(!settings.requires_ffmpeg());
        assert!(settings.is_nontrivial());
    }

    #[test]
    fn test_pitch_requires_ffmpeg() {
        let settings = DspSettings {
            pitch_shift: 2.0,
            ..Default::default()
        };
        assert!(settings.requires_ffmpeg());
    }

    #[test]
    fn test_tempo_only_does_not_require_ffmpeg_when_pitch_zero() {
        // Tempo alone is a bare player rate, no ffmpeg pass needed.
        let settings = DspSettings {
            tempo_scale: 0.8,
            ..Default::default()
        };
        assert!(!settings.requires_ffmpeg());
    }

    #[test]
    fn test_bare_negative_tempo_requires_ffmpeg() {
        let settings = DspSettings {
            tempo_scale: -2.0,
            ..Default::default()
        };
        assert!(settings.requires_ffmpeg());
        let (filters, _) = super::filters::build_chain(&settings);
        assert_eq!(filters[0], "areverse");
    }

    #[test]
    fn test_nightcore_preset() {
        let (pitch, tempo) = DspSettings::nightcore();
        assert!((tempo - 1.35).abs() < 1e-9);
        assert!(pitch > 0.0);
    }

    #[test]
    fn test_pitch_scale_matches_formula() {
        let settings = DspSettings {
            pitch_shift: 12.0,
            ..Default::default()
        };
        assert!((settings.pitch_scale() - 2.0).abs() < 1e-9);
    }
}
