//! A single queued unit of work: its source, DSP settings, resource, and the
//! handful of cross-task signals the playback loop and `skip*` operations
//! coordinate through.
//!
//! `skipped` is a bare atomic flag rather than a queue-side removal: the
//! playback loop is the only thing that ever actually removes an element
//! from sight, so a skip just needs to be visible to whoever's looking,
//! not physically pulled out of whatever queue it's sitting in.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::chat::StatusReporter;
use crate::dsp::{DspSettings, VlcSettings};
use crate::error::Result;
use crate::resource::Resource;
use crate::source::AudioSource;

/// Monotonic identifier handed out by [`crate::queue::AudioQueue::add`];
/// doubles as the skip-button callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One element of either lane. Shared via `Arc` between the queue, the
/// download task, and any in-flight `skip*` call.
pub struct QueueElement {
    id: ElementId,
    resource: Mutex<Option<Resource>>,
    source: Box<dyn AudioSource>,
    dsp: DspSettings,
    status: Box<dyn StatusReporter>,
    skipped: AtomicBool,
    active: AtomicBool,
    vlc_settings: Mutex<VlcSettings>,
    path_rx: Mutex<Option<oneshot::Receiver<Option<PathBuf>>>>,
    download_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for QueueElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueElement")
            .field("id", &self.id)
            .field("title", &self.source.title())
            .field("skipped", &self.skipped.load(Ordering::Relaxed))
            .finish()
    }
}

impl QueueElement {
    pub fn new(
        id: ElementId,
        resource: Option<Resource>,
        source: Box<dyn AudioSource>,
        dsp: DspSettings,
        status: Box<dyn StatusReporter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            resource: Mutex::new(resource),
            source,
            dsp,
            status,
            skipped: AtomicBool::new(false),
            active: AtomicBool::new(false),
            vlc_settings: Mutex::new(VlcSettings::default()),
            path_rx: Mutex::new(None),
            download_task: Mutex::new(None),
        })
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn dsp(&self) -> &DspSettings {
        &self.dsp
    }

    pub fn title(&self) -> &str {
        self.source.title()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub async fn vlc_settings(&self) -> VlcSettings {
        *self.vlc_settings.lock().await
    }

    pub async fn report(&self, text: &str, skippable: bool) -> Result<()> {
        self.status.report(text, skippable).await
    }

    /// Spawn the background download-then-process task. The returned
    /// receiver resolves to the final playable path, or `None` if the
    /// element was skipped before or during the download.
    pub fn spawn_download(self: &Arc<Self>) -> oneshot::Receiver<Option<PathBuf>> {
        let (tx, rx) = oneshot::channel();
        let element = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let outcome = run_download(&element).await;
            match outcome {
                Ok(path) => {
                    let _ = tx.send(Some(path));
                }
                Err(e) => {
                    tracing::warn!(id = %element.id, error = %e, "element download failed");
                    element.skipped.store(true, Ordering::Release);
                    element.close_resource().await;
                    let _ = element.report(&format!("Failed: {e}"), false).await;
                    let _ = tx.send(None);
                }
            }
        });
        let mut task_slot = self
            .download_task
            .try_lock()
            .expect("spawn_download called before any other task touches download_task");
        *task_slot = Some(handle);
        rx
    }

    /// Mark `skipped`, cancel the in-flight download if any, and close the
    /// resource. Idempotent: a second call observes `skipped` already true
    /// and does nothing further.
    pub async fn skip(self: &Arc<Self>, by: &str) -> bool {
        if self.skipped.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.active.store(false, Ordering::Release);
        if let Some(handle) = self.download_task.lock().await.take() {
            handle.abort();
        }
        self.close_resource().await;
        let _ = self.report(&format!("Skipped by {by}"), false).await;
        true
    }

    pub async fn close_resource(&self) {
        if let Some(mut resource) = self.resource.lock().await.take() {
            if let Err(e) = resource.close() {
                tracing::warn!(id = %self.id, error = %e, "failed to close resource");
            }
        }
    }

    /// Called once the element has fully finished playing (or looped to
    /// completion); releases its resource exactly once.
    pub async fn finish(&self) {
        self.active.store(false, Ordering::Release);
        self.close_resource().await;
        let _ = self.report("Played", false).await;
    }
}

async fn run_download(element: &Arc<QueueElement>) -> Result<PathBuf> {
    element.report("Downloading", false).await?;

    let resource_guard = element.resource.lock().await;
    let resource = resource_guard
        .as_ref()
        .expect("non-sfx elements are always given a resource at construction");
    let downloaded = element.source.download(resource).await?;
    let resource_dir = resource.path().to_path_buf();
    drop(resource_guard);

    if element.dsp.requires_ffmpeg() {
        element.report("Processing", false).await?;
        let dest = crate::dsp::filters::processed_path(&resource_dir);
        let vlc_settings = crate::dsp::filters::process_audio(&downloaded, &dest, &element.dsp).await?;
        *element.vlc_settings.lock().await = vlc_settings;
        element.report("Queued", true).await?;
        Ok(dest)
    } else {
        *element.vlc_settings.lock().await = VlcSettings {
            tempo_scale: element.dsp.tempo_scale.abs(),
        };
        element.report("Queued", true).await?;
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::NullReporter;
    use crate::resource::ResourceHandler;
    use crate::source::LocalFile;

    fn handler(root: &std::path::Path) -> ResourceHandler {
        ResourceHandler::new(root).unwrap()
    }

    #[tokio::test]
    async fn test_download_resolves_path_and_queues() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("song.wav");
        tokio::fs::write(&src, b"audio-bytes").await.unwrap();

        let handler = handler(&dir.path().join("resources"));
        let resource = handler.claim().unwrap();

        let element = QueueElement::new(
            ElementId(1),
            Some(resource),
            Box::new(LocalFile::new(&src)),
            DspSettings::default(),
            Box::new(NullReporter),
        );

        let rx = element.spawn_download();
        let path = rx.await.unwrap();
        assert!(path.is_some());
        assert!(!element.is_skipped());
    }

    #[tokio::test]
    async fn test_skip_before_download_completes_resolves_none_eventually() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(&dir.path().join("resources"));
        let resource = handler.claim().unwrap();

        // A source that never actually exists triggers the failure path,
        // which also sets `skipped` — standing in for an explicit skip
        // raced against an in-flight download.
        let element = QueueElement::new(
            ElementId(7),
            Some(resource),
            Box::new(LocalFile::new(dir.path().join("missing.wav"))),
            DspSettings::default(),
            Box::new(NullReporter),
        );

        let rx = element.spawn_download();
        let path = rx.await.unwrap();
        assert!(path.is_none());
        assert!(element.is_skipped());
    }

    #[tokio::test]
    async fn test_skip_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(&dir.path().join("resources"));
        let resource = handler.claim().unwrap();

        let element = QueueElement::new(
            ElementId(2),
            Some(resource),
            Box::new(LocalFile::new(dir.path().join("x.wav"))),
            DspSettings::default(),
            Box::new(NullReporter),
        );

        assert!(element.skip("alice").await);
        assert!(!element.skip("bob").await);
        assert!(element.is_skipped());
    }
}
