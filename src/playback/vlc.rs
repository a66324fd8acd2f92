//! Concrete [`AudioPlayer`]: drives a `vlc --intf rc` child process over its
//! stdio.
//!
//! Grounded in `vlc_interface.py`, which wraps `python-vlc`'s `MediaPlayer`
//! (`set_media`/`play`/`set_pause`/`stop`/`audio_set_volume`/`get_state`).
//! Nothing links `libvlc` directly here, so the equivalent is the same
//! "shell out and drive it" approach `fetcher.rs` takes for `yt-dlp`: spawn
//! VLC's `rc` (remote-control) interface and send it the same handful of
//! line-oriented commands, polling `status` on the queue's own refresh tick
//! instead of a push-based callback — the rc interface only offers
//! query-on-demand.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{AudioPlayer, PlayerState};
use crate::error::{Error, Result};

pub struct VlcProcess {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<Lines<BufReader<ChildStdout>>>,
    volume: AtomicU32,
}

impl VlcProcess {
    /// Spawn a fresh `vlc --intf rc --rc-fake-tty` instance. One instance
    /// per playback lane: main and SFX lanes are independent.
    pub async fn spawn() -> Result<Self> {
        let mut child = Command::new("vlc")
            .arg("--intf")
            .arg("rc")
            .arg("--rc-fake-tty")
            .arg("--no-video")
            .arg("--quiet")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::playback(format!("failed to spawn vlc: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::playback("vlc child has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::playback("vlc child has no stdout"))?;

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout).lines()),
            volume: AtomicU32::new(256), // VLC's rc interface uses 0..=1024, 256 == 100%
        })
    }

    /// Send one rc command; VLC's rc interface doesn't echo most commands,
    /// so this only waits for the write to land, not for a reply.
    async fn send(&self, command: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(|e| Error::playback(format!("vlc rc write failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::playback(format!("vlc rc flush failed: {e}")))
    }

    /// Send a command that does produce output (`status`) and return its
    /// first reply line.
    async fn query(&self, command: &str) -> Result<String> {
        self.send(command).await?;
        let mut stdout = self.stdout.lock().await;
        stdout
            .next_line()
            .await
            .map_err(|e| Error::playback(format!("vlc rc read failed: {e}")))?
            .ok_or_else(|| Error::playback("vlc rc closed its stdout"))
    }
}

#[async_trait]
impl AudioPlayer for VlcProcess {
    async fn set_media(&self, path: &Path) -> Result<()> {
        self.send(&format!("add {}", path.display())).await
    }

    async fn set_rate(&self, rate: f64) -> Result<()> {
        self.send(&format!("rate {rate}")).await
    }

    async fn play(&self) -> Result<()> {
        self.send("play").await
    }

    async fn pause(&self, paused: bool) -> Result<()> {
        // rc's "pause" toggles; drive explicit state via play/pause directly.
        if paused {
            self.send("pause").await
        } else {
            self.send("play").await
        }
    }

    async fn stop(&self) -> Result<()> {
        self.send("stop").await
    }

    async fn state(&self) -> PlayerState {
        match self.query("status").await {
            Ok(line) => parse_state(&line),
            Err(e) => {
                tracing::warn!("vlc rc status query failed: {e}");
                PlayerState::Error
            }
        }
    }

    async fn set_volume(&self, absolute: u32) -> Result<bool> {
        let scaled = absolute.min(1024);
        self.send(&format!("volume {scaled}")).await?;
        self.volume.store(scaled, Ordering::Relaxed);
        Ok(true)
    }

    async fn volume(&self) -> u32 {
        self.volume.load(Ordering::Relaxed)
    }
}

impl Drop for VlcProcess {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.start_kill();
        }
    }
}

/// VLC's rc `status` output carries a line like `( state stopped )` among
/// other chatter; match on the handful of state words it can contain.
fn parse_state(line: &str) -> PlayerState {
    let lower = line.to_lowercase();
    if lower.contains("playing") {
        PlayerState::Playing
    } else if lower.contains("paused") {
        PlayerState::Paused
    } else if lower.contains("opening") {
        PlayerState::Opening
    } else if lower.contains("buffering") {
        PlayerState::Buffering
    } else if lower.contains("ended") {
        PlayerState::Ended
    } else if lower.contains("error") {
        PlayerState::Error
    } else if lower.contains("stopped") || lower.contains("stop") {
        PlayerState::Stopped
    } else {
        PlayerState::NothingSpecial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state_recognizes_each_keyword() {
        assert_eq!(parse_state("( state playing )"), PlayerState::Playing);
        assert_eq!(parse_state("( state paused )"), PlayerState::Paused);
        assert_eq!(parse_state("( state stopped )"), PlayerState::Stopped);
        assert_eq!(parse_state("( state opening )"), PlayerState::Opening);
        assert_eq!(parse_state("( state ended )"), PlayerState::Ended);
        assert_eq!(parse_state("garbage"), PlayerState::NothingSpecial);
    }
}
