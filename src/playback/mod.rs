//! The audio-playback-engine collaborator's seam: the actual audio engine
//! (VLC) is out-of-scope core logic, but the queue still has to drive one.
//!
//! Grounded in `audio_queue.py`'s direct use of `python-vlc`'s
//! `MediaPlayer`: one player per lane, driven by `set_media` / `play` /
//! `pause` / `stop` / `set_rate` / `audio_set_volume`, polled for
//! `get_state()` on the playback loop's own tick — the engine exposes only
//! level-triggered state, so busy-polling is the right shape, not a defect
//! to engineer around.

pub mod mock;
pub mod vlc;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// The player-engine states the queue's `state()` derivation switches on.
/// Named after VLC's own `libvlc_state_t` since that's the engine every
/// implementation here ultimately drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    NothingSpecial,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl PlayerState {
    pub fn is_ended_or_stopped(self) -> bool {
        matches!(self, PlayerState::Ended | PlayerState::Stopped)
    }
}

/// One audio output lane. The queue engine owns two independent instances
/// (main + SFX) sharing only the volume tunable.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn set_media(&self, path: &Path) -> Result<()>;
    async fn set_rate(&self, rate: f64) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self, paused: bool) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn state(&self) -> PlayerState;

    /// Absolute player-unit volume, not the logical percent a user-facing
    /// `set_volume` accepts — that scaling happens one layer up, in the
    /// queue, exactly as `AudioQueue.set_digital_volume` does.
    async fn set_volume(&self, absolute: u32) -> Result<bool>;
    async fn volume(&self) -> u32;
}
