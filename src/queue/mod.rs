//! The audio queue engine: two independent playback lanes (main + sfx)
//! sharing a resource root and a volume, each driven by its own
//! always-running playback loop.
//!
//! Grounded in `audio_queue.py` (the queue/player coupling) and
//! `vlc_interface.py` (the add/play-next/skip shape); generalised to a full
//! state machine, skip-all reverse-order fan-out, and quiet-hours
//! preemption. Both loops poll the player on a fixed tick instead of
//! waiting on a player-side completion callback, so skip/pause/quiet-hours
//! checks are all just reads on the next tick rather than a signal the
//! player has to support.

pub mod element;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinSet;

use crate::chat::StatusReporter;
use crate::config::SharedSettings;
use crate::dsp::DspSettings;
use crate::error::{Error, Result};
use crate::playback::{AudioPlayer, PlayerState};
use crate::resource::ResourceHandler;
use crate::source::{sfx_source, AudioSource};

use element::{ElementId, QueueElement};

/// `AudioQueue::state()`'s result, collapsed to a pure function of
/// `(player_state, queue_nonempty, current_live)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Loading,
    Empty,
    Paused,
    Playing,
    UnknownError,
    PlayerError,
}

fn derive_state(player: PlayerState, queue_nonempty: bool, current_live: bool) -> QueueState {
    match player {
        PlayerState::Error => QueueState::PlayerError,
        PlayerState::Playing if current_live => QueueState::Playing,
        PlayerState::Paused if current_live => QueueState::Paused,
        PlayerState::Ended | PlayerState::Stopped | PlayerState::NothingSpecial
            if !queue_nonempty && !current_live =>
        {
            QueueState::Empty
        }
        _ if queue_nonempty && !current_live => QueueState::Loading,
        PlayerState::Ended | PlayerState::Stopped | PlayerState::NothingSpecial if current_live => {
            QueueState::Loading
        }
        PlayerState::Opening | PlayerState::Buffering if current_live => QueueState::Loading,
        _ => QueueState::UnknownError,
    }
}

type Pending = (Arc<QueueElement>, oneshot::Receiver<Option<PathBuf>>);

/// Owns both playback lanes and the resource root every element's download
/// lives under.
pub struct AudioQueue {
    resources: ResourceHandler,
    settings: SharedSettings,

    main_queue: Mutex<VecDeque<Pending>>,
    main_notify: Notify,
    current: Mutex<Option<Arc<QueueElement>>>,
    main_player: Arc<dyn AudioPlayer>,

    sfx_queue: Mutex<VecDeque<Pending>>,
    sfx_notify: Notify,
    sfx_player: Arc<dyn AudioPlayer>,

    id_counter: AtomicU64,
    volume_percent: AtomicU32,
}

impl AudioQueue {
    /// Build the queue and spawn its two playback loops. The loops run for
    /// the life of the returned `Arc`, started once at construction.
    pub fn start(
        resources: ResourceHandler,
        settings: SharedSettings,
        main_player: Arc<dyn AudioPlayer>,
        sfx_player: Arc<dyn AudioPlayer>,
    ) -> Arc<Self> {
        let queue = Arc::new(Self {
            resources,
            settings,
            main_queue: Mutex::new(VecDeque::new()),
            main_notify: Notify::new(),
            current: Mutex::new(None),
            main_player,
            sfx_queue: Mutex::new(VecDeque::new()),
            sfx_notify: Notify::new(),
            sfx_player,
            id_counter: AtomicU64::new(0),
            volume_percent: AtomicU32::new(100),
        });

        tokio::spawn(Arc::clone(&queue).run_main_loop());
        tokio::spawn(Arc::clone(&queue).run_sfx_loop());

        queue
    }

    fn next_id(&self) -> ElementId {
        ElementId(self.id_counter.fetch_add(1, Ordering::Relaxed))
    }

    async fn refresh_period(&self) -> std::time::Duration {
        self.settings.get().await.async_sleep_refresh_rate()
    }

    async fn quiet_hours(&self) -> bool {
        let settings = self.settings.get().await;
        crate::quiet_hours::is_quiet_hours(chrono::Local::now(), &settings)
    }

    // ---- main lane -------------------------------------------------

    /// Enqueue a freshly parsed request: claims a resource, assigns an id,
    /// and spawns its download task.
    pub async fn add(
        &self,
        source: Box<dyn AudioSource>,
        dsp: DspSettings,
        status: Box<dyn StatusReporter>,
    ) -> Result<ElementId> {
        let resource = self.resources.claim()?;
        let id = self.next_id();
        let element = QueueElement::new(id, Some(resource), source, dsp, status);
        let rx = element.spawn_download();

        self.main_queue.lock().await.push_back((element, rx));
        self.main_notify.notify_one();
        Ok(id)
    }

    async fn dequeue_main(&self) -> Pending {
        loop {
            let notified = self.main_notify.notified();
            {
                let mut queue = self.main_queue.lock().await;
                if let Some(pending) = queue.pop_front() {
                    return pending;
                }
            }
            notified.await;
        }
    }

    async fn run_main_loop(self: Arc<Self>) {
        loop {
            let (element, path_rx) = self.dequeue_main().await;
            if element.is_skipped() {
                continue;
            }

            *self.current.lock().await = Some(Arc::clone(&element));

            let path = match path_rx.await {
                Ok(Some(path)) if !element.is_skipped() => path,
                _ => {
                    *self.current.lock().await = None;
                    continue;
                }
            };

            if self.quiet_hours().await {
                self.skip_all("quiet hours").await;
                *self.current.lock().await = None;
                continue;
            }

            loop {
                if let Err(e) = self.play_one_pass(&element, &path).await {
                    tracing::error!(id = %element.id(), error = %e, "main player failed");
                }

                if self.quiet_hours().await {
                    self.skip_all("quiet hours").await;
                }

                let state = self.main_player.state().await;
                if !state.is_ended_or_stopped() {
                    let _ = self.main_player.stop().await;
                }

                if !element.dsp().loop_playback || element.is_skipped() {
                    break;
                }
            }

            element.finish().await;
            *self.current.lock().await = None;
        }
    }

    /// One play-through of `element` at `path`: attach media, play, and
    /// poll until the player reaches a terminal state, is skipped, or quiet
    /// hours begin.
    async fn play_one_pass(&self, element: &Arc<QueueElement>, path: &std::path::Path) -> Result<()> {
        let vlc_settings = element.vlc_settings().await;
        self.main_player.set_media(path).await?;
        self.main_player.set_rate(vlc_settings.tempo_scale).await?;
        element.report("Playing", true).await?;
        self.main_player.play().await?;
        element.set_active(true);

        let period = self.refresh_period().await;
        loop {
            tokio::time::sleep(period).await;
            let state = self.main_player.state().await;
            if state.is_ended_or_stopped() || element.is_skipped() || self.quiet_hours().await {
                break;
            }
        }
        Ok(())
    }

    // ---- sfx lane ----------------------------------------------------

    /// Resolve and enqueue a canned sound effect, bypassing the normal
    /// download task entirely: sfx sources are already-local files with no
    /// resource of their own.
    pub async fn enqueue_sfx(&self, name: &str) -> Result<ElementId> {
        let settings = self.settings.get().await;
        let path = settings.sfx_path.join(name);
        if !path.exists() {
            return Err(Error::user_input(format!("no such sound effect: {name}")));
        }

        let id = self.next_id();
        let element = QueueElement::new(
            id,
            None,
            Box::new(sfx_source(&path)),
            DspSettings::default(),
            Box::new(crate::chat::NullReporter),
        );
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Some(path));

        self.sfx_queue.lock().await.push_back((element, rx));
        self.sfx_notify.notify_one();
        Ok(id)
    }

    /// Convenience wrapper for the canned "hampter" effect.
    pub async fn hampter(&self) -> Result<ElementId> {
        self.enqueue_sfx("hampter.wav").await
    }

    async fn dequeue_sfx(&self) -> Pending {
        loop {
            let notified = self.sfx_notify.notified();
            {
                let mut queue = self.sfx_queue.lock().await;
                if let Some(pending) = queue.pop_front() {
                    return pending;
                }
            }
            notified.await;
        }
    }

    async fn run_sfx_loop(self: Arc<Self>) {
        loop {
            let (element, path_rx) = self.dequeue_sfx().await;
            if element.is_skipped() {
                continue;
            }

            let path = match path_rx.await {
                Ok(Some(path)) => path,
                _ => continue,
            };

            // The sfx lane never calls skip_all; on quiet hours it just
            // drops the element.
            if self.quiet_hours().await {
                continue;
            }

            if let Err(e) = self.sfx_player.set_media(&path).await {
                tracing::warn!(error = %e, "sfx player failed to set media");
                continue;
            }
            let _ = self.sfx_player.play().await;
            element.set_active(true);

            let period = self.refresh_period().await;
            loop {
                tokio::time::sleep(period).await;
                let state = self.sfx_player.state().await;
                if state.is_ended_or_stopped() || self.quiet_hours().await {
                    break;
                }
            }

            element.set_active(false);
        }
    }

    // ---- skip operations ----------------------------------------------

    /// Skip the currently playing element.
    pub async fn skip(&self, by: &str) -> bool {
        let current = self.current.lock().await.clone();
        match current {
            Some(element) => element.skip(by).await,
            None => false,
        }
    }

    /// Skip a specific element by id: the current element if it matches,
    /// otherwise walk the pending queue for it.
    pub async fn skip_specific(&self, by: &str, id: ElementId) -> bool {
        if let Some(current) = self.current.lock().await.clone() {
            if current.id() == id {
                return current.skip(by).await;
            }
        }

        let queue = self.main_queue.lock().await;
        for (element, _) in queue.iter() {
            if element.id() == id {
                let element = Arc::clone(element);
                drop(queue);
                return element.skip(by).await;
            }
        }
        false
    }

    /// Skip every unskipped element, including `current`, processing the
    /// still-queued elements in reverse order so parallel skips never race
    /// on front-of-queue operations. Skips every element that exists *now*:
    /// `current` is snapshotted before the fan-out rather than re-read after
    /// it, so a concurrent `add` racing this call is simply not included.
    pub async fn skip_all(&self, by: &str) -> usize {
        let pending: Vec<Arc<QueueElement>> = {
            let queue = self.main_queue.lock().await;
            queue.iter().map(|(e, _)| Arc::clone(e)).collect()
        };
        let current = self.current.lock().await.clone();

        let mut tasks: JoinSet<bool> = JoinSet::new();
        for element in pending.into_iter().rev() {
            let by = by.to_string();
            tasks.spawn(async move { element.skip(&by).await });
        }
        if let Some(current) = current {
            let by = by.to_string();
            tasks.spawn(async move { current.skip(&by).await });
        }

        let mut skipped = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap_or(false) {
                skipped += 1;
            }
        }
        skipped
    }

    // ---- transport & volume --------------------------------------------

    pub async fn pause(&self) -> Result<()> {
        self.main_player.pause(true).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.main_player.pause(false).await
    }

    /// Set volume from a logical percent, rejecting anything outside the
    /// configured absolute range and leaving both players untouched.
    /// Distinct from [`Self::set_volume_clamped`]: init-time callers clamp,
    /// user commands reject.
    pub async fn set_volume(&self, percent: u32) -> Result<()> {
        let settings = self.settings.get().await;
        let max_percent = settings.max_absolute_volume * 100;
        if percent > max_percent {
            return Err(Error::user_input(format!(
                "volume must be between 0 and {max_percent}"
            )));
        }
        self.apply_volume(percent, &settings).await
    }

    /// Set volume from a logical percent, clamping into range instead of
    /// rejecting.
    pub async fn set_volume_clamped(&self, percent: u32) -> Result<()> {
        let settings = self.settings.get().await;
        let max_percent = settings.max_absolute_volume * 100;
        self.apply_volume(percent.min(max_percent), &settings).await
    }

    async fn apply_volume(&self, percent: u32, settings: &crate::config::Settings) -> Result<()> {
        let absolute = (percent as u64 * settings.hundred_percent_volume_value as u64 / 100) as u32;
        self.main_player.set_volume(absolute).await?;
        self.sfx_player.set_volume(absolute).await?;
        self.volume_percent.store(percent, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_volume(&self) -> u32 {
        self.volume_percent.load(Ordering::Relaxed)
    }

    // ---- state -----------------------------------------------------------

    pub async fn state(&self) -> QueueState {
        let player_state = self.main_player.state().await;
        let current = self.current.lock().await.clone();
        let current_live = current
            .as_ref()
            .map(|e| !e.is_skipped())
            .unwrap_or(false);
        let queue_nonempty = !self.main_queue.lock().await.is_empty();
        derive_state(player_state, queue_nonempty, current_live)
    }

    /// Titles of elements still waiting to play, in play order, for the
    /// `queue`/`queued` command's snapshot rendering.
    pub async fn snapshot(&self) -> Vec<(ElementId, String)> {
        self.main_queue
            .lock()
            .await
            .iter()
            .filter(|(e, _)| !e.is_skipped())
            .map(|(e, _)| (e.id(), e.title().to_string()))
            .collect()
    }
}
