//! The chat-transport collaborator's seam.
//!
//! Everything in this crate that needs to talk to a chat (status callbacks,
//! the supervisor's pinned flood-control notice) is written against
//! [`ChatSink`] instead of a concrete bot library, the way
//! `message_edit_status_callback/__init__.py` is itself already an
//! abstraction boundary over whichever bot framework calls it.
//! [`telegram::TelegramChatSink`] is one concrete implementation, grounded
//! in the `worker_token_file`/`registered_primary_chat_id` settings that
//! name a bot token and chat id.

pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;

/// An opaque handle to a single chat message, returned by `send` and
/// consumed by `edit`/`pin`/`unpin`/`delete`. Transport-specific; this
/// crate never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

/// The capability set the queue engine and supervisor need from a chat
/// transport. A real implementation wraps a bot SDK; tests use
/// [`mock::RecordingSink`].
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<MessageId>;
    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<()>;
    async fn pin_message(&self, id: &MessageId) -> Result<()>;
    async fn unpin_message(&self, id: &MessageId) -> Result<()>;
    async fn delete_message(&self, id: &MessageId) -> Result<()>;
}

/// Object-safe handle to a [`StatusCallback`], so the queue engine can hold
/// one per element without being generic over the chat transport.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, text: &str, skippable: bool) -> Result<()>;
}

/// Per-element status reporting, invoked on every queue-element state
/// change. Wraps a [`ChatSink`] plus the one message it owns, lazily sent
/// on first call.
pub struct StatusCallback<S: ChatSink> {
    sink: std::sync::Arc<S>,
    message: tokio::sync::Mutex<Option<MessageId>>,
}

impl<S: ChatSink> StatusCallback<S> {
    pub fn new(sink: std::sync::Arc<S>) -> Self {
        Self {
            sink,
            message: tokio::sync::Mutex::new(None),
        }
    }

    /// Report a status string. `skippable` controls whether the transport
    /// would attach a skip button — this crate just threads the flag
    /// through since the button UI itself lives in the excluded
    /// command-dispatch glue.
    pub async fn report(&self, text: &str, skippable: bool) -> Result<()> {
        let _ = skippable;
        let mut guard = self.message.lock().await;
        match guard.as_ref() {
            Some(id) => self.sink.edit_message(id, text).await,
            None => {
                let id = self.sink.send_message(text).await?;
                *guard = Some(id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<S: ChatSink> StatusReporter for StatusCallback<S> {
    async fn report(&self, text: &str, skippable: bool) -> Result<()> {
        StatusCallback::report(self, text, skippable).await
    }
}

/// A status reporter that does nothing, for elements with no front-end to
/// report to (e.g. sfx elements enqueued outside a chat context in tests).
pub struct NullReporter;

#[async_trait]
impl StatusReporter for NullReporter {
    async fn report(&self, _text: &str, _skippable: bool) -> Result<()> {
        Ok(())
    }
}

/// A stand-in [`ChatSink`] that logs through `tracing` instead of talking to
/// a real chat transport — the out-of-scope SDK never enters this crate's
/// dependency stack, so this is what `main.rs` wires up by default. A real
/// deployment swaps this for a transport-specific `ChatSink` impl without
/// touching anything upstream of it.
#[derive(Default)]
pub struct ConsoleChatSink {
    next_id: std::sync::atomic::AtomicU64,
}

#[async_trait]
impl ChatSink for ConsoleChatSink {
    async fn send_message(&self, text: &str) -> Result<MessageId> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        tracing::info!(message_id = id, "{text}");
        Ok(MessageId(id.to_string()))
    }

    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<()> {
        tracing::info!(message_id = %id.0, "(edit) {text}");
        Ok(())
    }

    async fn pin_message(&self, id: &MessageId) -> Result<()> {
        tracing::info!(message_id = %id.0, "(pinned)");
        Ok(())
    }

    async fn unpin_message(&self, id: &MessageId) -> Result<()> {
        tracing::info!(message_id = %id.0, "(unpinned)");
        Ok(())
    }

    async fn delete_message(&self, id: &MessageId) -> Result<()> {
        tracing::info!(message_id = %id.0, "(deleted)");
        Ok(())
    }
}

pub mod mock {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every call for test assertions; `send_message` hands out
    /// monotonically numbered [`MessageId`]s.
    #[derive(Default)]
    pub struct RecordingSink {
        next_id: std::sync::atomic::AtomicU64,
        pub calls: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatSink for RecordingSink {
        async fn send_message(&self, text: &str) -> Result<MessageId> {
            let id = self
                .next_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.calls
                .lock()
                .await
                .push(format!("send({id}): {text}"));
            Ok(MessageId(id.to_string()))
        }

        async fn edit_message(&self, id: &MessageId, text: &str) -> Result<()> {
            self.calls
                .lock()
                .await
                .push(format!("edit({}): {text}", id.0));
            Ok(())
        }

        async fn pin_message(&self, id: &MessageId) -> Result<()> {
            self.calls.lock().await.push(format!("pin({})", id.0));
            Ok(())
        }

        async fn unpin_message(&self, id: &MessageId) -> Result<()> {
            self.calls.lock().await.push(format!("unpin({})", id.0));
            Ok(())
        }

        async fn delete_message(&self, id: &MessageId) -> Result<()> {
            self.calls.lock().await.push(format!("delete({})", id.0));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingSink;
    use super::*;

    #[tokio::test]
    async fn test_status_callback_sends_then_edits() {
        let sink = std::sync::Arc::new(RecordingSink::new());
        let callback = StatusCallback::new(std::sync::Arc::clone(&sink));

        callback.report("Downloading", true).await.unwrap();
        callback.report("Queued", true).await.unwrap();
        callback.report("Playing", false).await.unwrap();

        let calls = sink.calls().await;
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("send(0): Downloading"));
        assert!(calls[1].starts_with("edit(0): Queued"));
        assert!(calls[2].starts_with("edit(0): Playing"));
    }
}
