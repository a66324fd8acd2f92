//! Plain-text handler functions the excluded command-dispatch glue would
//! call: each returns a plain-text (not HTML) status string, leaving
//! markup and chat-specific framing to whatever router calls these.
//!
//! Grounded in the shape of `audio_queue.py`'s own command methods
//! (`add`, `skip`, `skip_all`, `set_digital_volume`, ...): each takes
//! whatever arguments the router would have already extracted and returns
//! a short status string, with no knowledge of permissions, HTML, or which
//! chat it's replying in.

use std::sync::Arc;

use crate::chat::{ChatSink, StatusCallback};
use crate::error::Result;
use crate::parser::{self, QueryKind};
use crate::queue::element::ElementId;
use crate::queue::AudioQueue;
use crate::source::{AudioSource, MetadataResolver, RemoteQuery, RemoteQueryKind, UploadedBlob};

/// Everything a handler needs: the queue it drives, the chat it reports
/// through, and the media-fetcher collaborator it resolves remote queries
/// against.
pub struct WorkerContext<S: ChatSink> {
    pub queue: Arc<AudioQueue>,
    pub chat: Arc<S>,
    pub resolver: Arc<dyn MetadataResolver>,
}

impl<S: ChatSink + 'static> WorkerContext<S> {
    pub fn new(queue: Arc<AudioQueue>, chat: Arc<S>, resolver: Arc<dyn MetadataResolver>) -> Self {
        Self { queue, chat, resolver }
    }
}

/// Parse `args` and enqueue the resulting source, resolving a remote query
/// through the context's [`MetadataResolver`] when no blob is attached.
pub async fn enqueue<S: ChatSink + 'static>(
    ctx: &WorkerContext<S>,
    args: &[String],
    blob: Option<UploadedBlob>,
) -> Result<String> {
    let parsed = parser::parse_queue_args(args, blob.is_some()).map_err(|e| crate::error::Error::user_input(e.0))?;

    let source: Box<dyn AudioSource> = match blob {
        Some(blob) => Box::new(blob),
        None => {
            let query = parsed
                .query
                .expect("parser guarantees a query when no blob is attached");
            let kind = match query {
                QueryKind::Url(url) => RemoteQueryKind::Url(url),
                QueryKind::Search(text) => RemoteQueryKind::Search(text),
            };
            let resolved = RemoteQuery::resolve(kind, Arc::clone(&ctx.resolver)).await?;
            Box::new(resolved)
        }
    };

    let title = source.title().to_string();
    let status = Box::new(StatusCallback::new(Arc::clone(&ctx.chat)));
    let id = ctx.queue.add(source, parsed.dsp, status).await?;
    Ok(format!("Queued #{id}: {title}"))
}

/// Skip whatever is currently playing.
pub async fn skip<S: ChatSink + 'static>(ctx: &WorkerContext<S>, by: &str) -> String {
    if ctx.queue.skip(by).await {
        "Skipped.".to_string()
    } else {
        "Nothing is playing.".to_string()
    }
}

/// Skip one specific element by id, wherever it sits in the queue.
pub async fn skip_specific<S: ChatSink + 'static>(ctx: &WorkerContext<S>, by: &str, id: u64) -> String {
    if ctx.queue.skip_specific(by, ElementId(id)).await {
        format!("Skipped #{id}.")
    } else {
        format!("No such element: #{id}.")
    }
}

/// Skip every unskipped element, main-lane current included.
pub async fn skip_all<S: ChatSink + 'static>(ctx: &WorkerContext<S>, by: &str) -> String {
    let count = ctx.queue.skip_all(by).await;
    format!("Skipped {count} element(s).")
}

pub async fn pause<S: ChatSink + 'static>(ctx: &WorkerContext<S>) -> Result<String> {
    ctx.queue.pause().await?;
    Ok("Paused.".to_string())
}

pub async fn resume<S: ChatSink + 'static>(ctx: &WorkerContext<S>) -> Result<String> {
    ctx.queue.resume().await?;
    Ok("Resumed.".to_string())
}

/// Set volume from a logical percent, rejecting out-of-range values — the
/// reject-not-clamp half of the two-function split. Callers that want
/// clamping go straight to [`crate::queue::AudioQueue::set_volume_clamped`]
/// instead.
pub async fn set_volume<S: ChatSink + 'static>(ctx: &WorkerContext<S>, percent: u32) -> Result<String> {
    ctx.queue.set_volume(percent).await?;
    Ok(format!("Volume set to {percent}%."))
}

pub async fn get_volume<S: ChatSink + 'static>(ctx: &WorkerContext<S>) -> String {
    format!("Volume: {}%.", ctx.queue.get_volume())
}

/// Play the canned "hampter" sound effect.
pub async fn hampter<S: ChatSink + 'static>(ctx: &WorkerContext<S>) -> Result<String> {
    ctx.queue.hampter().await?;
    Ok("Hampter!".to_string())
}

/// List titles still waiting to play, in play order.
pub async fn queued<S: ChatSink + 'static>(ctx: &WorkerContext<S>) -> String {
    let snapshot = ctx.queue.snapshot().await;
    if snapshot.is_empty() {
        return "Queue is empty.".to_string();
    }
    snapshot
        .into_iter()
        .map(|(id, title)| format!("#{id}: {title}"))
        .collect::<Vec<_>>()
        .join("\n")
}
