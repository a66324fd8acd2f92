//! The worker process: owns the audio queue, listens on its own stdin for
//! the supervisor's downward shutdown command, and reports its exit
//! disposition upward on its own stdout.
//!
//! Grounded in `bot_configs/further_bot.py`'s scheduler loop (the thing the
//! supervisor spawns and tears down), generalized to a typed IPC handshake
//! instead of a shared-memory event flag — a small explicit wire format
//! over the worker child's stdio rather than a language-specific pickled
//! object.

pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use crate::config::SharedSettings;
use crate::error::{Error, Result};
use crate::ipc::{write_message, ConnectionListener, Downward, Upward};
use crate::playback::AudioPlayer;
use crate::queue::{AudioQueue, QueueState};
use crate::resource::ResourceHandler;

pub use commands::WorkerContext;

/// How long to wait for the queue to drain after a graceful shutdown
/// request before giving up and reporting
/// [`Upward::ThreadingFailedShutdown`]: ten half-second polls, ~5s total.
const SHUTDOWN_GRACE_POLLS: u32 = 10;
const SHUTDOWN_GRACE_POLL_PERIOD: Duration = Duration::from_millis(500);

/// Run one worker process to completion: build the queue, drive it until a
/// downward shutdown command arrives, and report the outcome on stdout.
/// Returns once the worker has fully shut down (or propagates a genuine
/// top-level failure, having already reported it as an
/// [`Upward::ExceptionShutdown`]).
///
/// This only drives the shutdown lifecycle — turning user chat commands
/// into calls against the returned queue (via [`WorkerContext`] and
/// [`commands`]) is the excluded command-dispatch glue's job, not this
/// function's.
pub async fn run(
    settings: SharedSettings,
    main_player: Arc<dyn AudioPlayer>,
    sfx_player: Arc<dyn AudioPlayer>,
    resource_root: PathBuf,
) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    match run_inner(settings, main_player, sfx_player, resource_root).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = write_message(
                &mut stdout,
                &Upward::ExceptionShutdown {
                    error: e.to_string(),
                },
            )
            .await;
            Err(e)
        }
    }
}

async fn run_inner(
    settings: SharedSettings,
    main_player: Arc<dyn AudioPlayer>,
    sfx_player: Arc<dyn AudioPlayer>,
    resource_root: PathBuf,
) -> Result<()> {
    let resources = ResourceHandler::new(resource_root)?;
    let queue = AudioQueue::start(resources, settings, main_player, sfx_player);

    let force = wait_for_shutdown_command().await;

    let mut stdout = tokio::io::stdout();
    if force {
        return Err(forced_shutdown_error());
    }

    queue.pause().await.ok();
    if wait_for_queue_to_drain(&queue).await {
        write_message(&mut stdout, &Upward::CleanShutdown).await?;
    } else {
        write_message(&mut stdout, &Upward::ThreadingFailedShutdown).await?;
    }
    Ok(())
}

/// A forced shutdown skips the drain wait entirely and raises a fatal
/// signal inside the worker's event loop instead of unwinding gracefully —
/// this is not a clean exit, so `run` reports it as an `ExceptionShutdown`
/// and propagates a non-zero exit rather than a `CleanShutdown`.
fn forced_shutdown_error() -> Error {
    Error::Worker("forced shutdown requested".to_string())
}

/// Block until a [`Downward::ShutDown`] command arrives on this process's
/// own stdin, returning its `force` flag. Standalone local testing (no
/// supervisor attached, stdin closed immediately) falls through to a
/// graceful (`force = false`) shutdown so the process doesn't hang
/// forever waiting on a command nobody will send.
async fn wait_for_shutdown_command() -> bool {
    let listener: ConnectionListener<Downward, tokio::io::Stdin> =
        ConnectionListener::new(tokio::io::stdin());
    let force = AsyncMutex::new(false);
    let result = listener
        .listen(|message| {
            let force = &force;
            async move {
                let Downward::ShutDown { force: requested } = message;
                *force.lock().await = requested;
            }
        })
        .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "supervisor IPC listener exited unexpectedly");
    }
    *force.lock().await
}

/// Poll the queue's state for up to [`SHUTDOWN_GRACE_POLLS`] half-second
/// ticks, returning `true` once it reaches [`QueueState::Empty`].
async fn wait_for_queue_to_drain(queue: &Arc<AudioQueue>) -> bool {
    for _ in 0..SHUTDOWN_GRACE_POLLS {
        if queue.state().await == QueueState::Empty {
            return true;
        }
        tokio::time::sleep(SHUTDOWN_GRACE_POLL_PERIOD).await;
    }
    queue.state().await == QueueState::Empty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::playback::mock::MockPlayer;

    #[test]
    fn test_forced_shutdown_is_a_fatal_error_not_a_clean_exit() {
        let err = forced_shutdown_error();
        assert!(matches!(err, Error::Worker(_)));
    }

    #[tokio::test]
    async fn test_wait_for_queue_to_drain_returns_true_for_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        let resources = ResourceHandler::new(dir.path().join("resources")).unwrap();
        let settings = SharedSettings::new(Settings {
            async_sleep_refresh_rate_secs: 0.01,
            ..Settings::default()
        });
        let queue = AudioQueue::start(
            resources,
            settings,
            Arc::new(MockPlayer::new()),
            Arc::new(MockPlayer::new()),
        );
        assert!(wait_for_queue_to_drain(&queue).await);
    }
}
