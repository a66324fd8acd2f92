//! Owns the worker child process, listens for its upward events, and keeps
//! the single pinned flood-control notice honest.
//!
//! Grounded in `bot_configs/supervisor_bot.py`'s `further_bot_target` /
//! `further_bot_communications_handler` / `clear_flood_control_message_callback`
//! trio: spawn the worker, dispatch each upward event by match, and poll
//! until the scheduled clear time instead of the original's
//! `call_later`-based timer (this crate has no event-loop callback
//! primitive to imitate; the same cooperative-polling idiom the queue
//! engine's playback loops use serves just as well here).

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;

use crate::chat::{ChatSink, MessageId};
use crate::config::SharedSettings;
use crate::error::{Error, Result};
use crate::ipc::{ConnectionListener, Downward, Upward};

struct PinnedNotice {
    message_id: MessageId,
    clear_at: Instant,
}

/// Owns one worker child and the bookkeeping of its current run: the
/// child process handle, its stdin for downward commands, and the single
/// pinned flood-control notice, if any.
pub struct Supervisor<S: ChatSink> {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    chat: Arc<S>,
    settings: SharedSettings,
    pinned: Mutex<Option<PinnedNotice>>,
}

impl<S: ChatSink + 'static> Supervisor<S> {
    /// Spawn `worker_binary` as a detached child with its stdin/stdout
    /// wired for the IPC protocol, start its listener task, and clear any
    /// notice left pinned by a previous run (`stale_pinned`, since this
    /// crate keeps no persistent store of its own to rediscover one).
    pub async fn spawn(
        worker_binary: &Path,
        worker_args: &[String],
        chat: Arc<S>,
        settings: SharedSettings,
        stale_pinned: Option<MessageId>,
    ) -> Result<Arc<Self>> {
        if let Some(stale) = stale_pinned {
            let _ = chat.unpin_message(&stale).await;
            let _ = chat.delete_message(&stale).await;
        }

        let mut child = Command::new(worker_binary)
            .args(worker_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Supervisor(format!("failed to spawn worker: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Supervisor("worker child has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Supervisor("worker child has no stdout".to_string()))?;

        let supervisor = Arc::new(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            chat,
            settings,
            pinned: Mutex::new(None),
        });

        tokio::spawn(Arc::clone(&supervisor).run_listener(stdout));
        tokio::spawn(Arc::clone(&supervisor).run_clear_poll());

        Ok(supervisor)
    }

    /// Send a downward shutdown command.
    pub async fn shut_down(&self, force: bool) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        crate::ipc::write_message(&mut stdin, &Downward::ShutDown { force }).await
    }

    async fn run_listener(self: Arc<Self>, stdout: tokio::process::ChildStdout) {
        let listener = ConnectionListener::<Upward, tokio::process::ChildStdout>::new(stdout);
        let result = listener
            .listen(|event| {
                let supervisor = Arc::clone(&self);
                async move {
                    supervisor.dispatch(event).await;
                }
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "worker IPC listener exited");
        }
    }

    /// The upward-event dispatch table.
    async fn dispatch(&self, event: Upward) {
        match event {
            Upward::CleanShutdown => {
                let _ = self.chat.send_message("Clean worker shutdown detected").await;
            }
            Upward::ExceptionShutdown { error } => {
                let _ = self
                    .chat
                    .send_message("Managed exception worker shutdown detected")
                    .await;
                tracing::error!(error, "worker reported a top-level exception");
            }
            Upward::FloodControlIssues { delay_seconds } => {
                self.handle_flood_control(Duration::from_secs_f64(delay_seconds)).await;
            }
            Upward::ThreadingFailedShutdown => {
                let _ = self
                    .chat
                    .send_message("Worker threads failed to terminate; consider a forced shutdown")
                    .await;
            }
        }
    }

    /// Pin a notice on the first flood-control event; extend its clear
    /// time (never shorten it) on every subsequent one while still pinned.
    async fn handle_flood_control(&self, delay: Duration) {
        let resume_at = Instant::now() + delay;
        let mut pinned = self.pinned.lock().await;
        match pinned.as_mut() {
            Some(notice) => {
                notice.clear_at = notice.clear_at.max(resume_at);
            }
            None => {
                let Ok(message_id) = self
                    .chat
                    .send_message("Outbound API throttling detected - expect long delays")
                    .await
                else {
                    return;
                };
                let _ = self.chat.pin_message(&message_id).await;
                *pinned = Some(PinnedNotice {
                    message_id,
                    clear_at: resume_at,
                });
            }
        }
    }

    async fn run_clear_poll(self: Arc<Self>) {
        loop {
            let period = self.settings.get().await.async_sleep_refresh_rate();
            tokio::time::sleep(period).await;

            let mut pinned = self.pinned.lock().await;
            if let Some(notice) = pinned.as_ref() {
                if Instant::now() >= notice.clear_at {
                    let _ = self.chat.unpin_message(&notice.message_id).await;
                    let _ = self.chat.delete_message(&notice.message_id).await;
                    *pinned = None;
                }
            }
        }
    }

    /// Whether the child is still running, without reaping it.
    pub async fn is_worker_alive(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::mock::RecordingSink;
    use crate::config::Settings;

    fn fast_settings() -> SharedSettings {
        SharedSettings::new(Settings {
            async_sleep_refresh_rate_secs: 0.01,
            ..Settings::default()
        })
    }

    async fn supervisor_for_test() -> (Arc<Supervisor<RecordingSink>>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let supervisor = Supervisor::spawn(
            Path::new("true"),
            &[],
            Arc::clone(&sink),
            fast_settings(),
            None,
        )
        .await
        .unwrap();
        (supervisor, sink)
    }

    #[tokio::test]
    async fn test_clean_shutdown_posts_a_notice() {
        let (supervisor, sink) = supervisor_for_test().await;
        supervisor.dispatch(Upward::CleanShutdown).await;
        let calls = sink.calls().await;
        assert!(calls.iter().any(|c| c.contains("Clean worker shutdown")));
    }

    #[tokio::test]
    async fn test_flood_control_pins_once_and_extends_clear_time() {
        let (supervisor, sink) = supervisor_for_test().await;

        supervisor
            .dispatch(Upward::FloodControlIssues { delay_seconds: 5.0 })
            .await;
        supervisor
            .dispatch(Upward::FloodControlIssues { delay_seconds: 10.0 })
            .await;

        let calls = sink.calls().await;
        let pins = calls.iter().filter(|c| c.starts_with("pin(")).count();
        assert_eq!(pins, 1, "only the first event should pin a new notice");

        let pinned = supervisor.pinned.lock().await;
        let notice = pinned.as_ref().unwrap();
        assert!(notice.clear_at >= Instant::now() + Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_clear_poll_eventually_unpins() {
        let (supervisor, sink) = supervisor_for_test().await;
        supervisor
            .dispatch(Upward::FloodControlIssues { delay_seconds: 0.02 })
            .await;

        for _ in 0..50 {
            if supervisor.pinned.lock().await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(supervisor.pinned.lock().await.is_none());
        let calls = sink.calls().await;
        assert!(calls.iter().any(|c| c.starts_with("unpin(")));
        assert!(calls.iter().any(|c| c.starts_with("delete(")));
    }
}
