//! A test-only [`AudioPlayer`] with no real engine behind it — the queue
//! engine's unit tests drive state transitions directly instead of waiting
//! on a real subprocess.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AudioPlayer, PlayerState};
use crate::error::Result;

pub struct MockPlayer {
    inner: Mutex<Inner>,
}

struct Inner {
    state: PlayerState,
    media: Option<PathBuf>,
    rate: f64,
    volume: u32,
}

impl Default for MockPlayer {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: PlayerState::NothingSpecial,
                media: None,
                rate: 1.0,
                volume: 100,
            }),
        }
    }
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: force the player into a given state, simulating the
    /// engine reaching `Ended` on its own or erroring out mid-playback.
    pub fn force_state(&self, state: PlayerState) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn current_rate(&self) -> f64 {
        self.inner.lock().unwrap().rate
    }

    pub fn current_media(&self) -> Option<PathBuf> {
        self.inner.lock().unwrap().media.clone()
    }
}

#[async_trait]
impl AudioPlayer for MockPlayer {
    async fn set_media(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.media = Some(path.to_path_buf());
        inner.state = PlayerState::Opening;
        Ok(())
    }

    async fn set_rate(&self, rate: f64) -> Result<()> {
        self.inner.lock().unwrap().rate = rate;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.inner.lock().unwrap().state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&self, paused: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.state = if paused {
            PlayerState::Paused
        } else {
            PlayerState::Playing
        };
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.inner.lock().unwrap().state = PlayerState::Stopped;
        Ok(())
    }

    async fn state(&self) -> PlayerState {
        self.inner.lock().unwrap().state
    }

    async fn set_volume(&self, absolute: u32) -> Result<bool> {
        self.inner.lock().unwrap().volume = absolute;
        Ok(true)
    }

    async fn volume(&self) -> u32 {
        self.inner.lock().unwrap().volume
    }
}
