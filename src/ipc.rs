//! Typed messages passed between the supervisor and worker processes over
//! the worker child's stdio, newline-delimited JSON per message.
//!
//! Grounded in `bot_communication.py`'s `UpwardsCommunication` /
//! `DownwardsCommunication` GADTs and `ConnectionListener` (a blocking
//! `recv()` driven through `asyncio.to_thread`), generalized to a small
//! explicit wire format in place of pickled Python objects: plain
//! `#[serde(tag = "type")]` enums instead of a metaclass-backed GADT, over
//! the worker's own stdin/stdout rather than a `multiprocessing.Pipe` (no
//! such primitive crosses a `tokio::process::Child` boundary).

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Worker → supervisor events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Upward {
    /// The worker's scheduler exited normally and all non-main threads
    /// have terminated.
    CleanShutdown,
    /// The worker caught a top-level exception; `error` is a serializable
    /// summary, not a full backtrace.
    ExceptionShutdown { error: String },
    /// Outbound API throttled; the supervisor should pin a notice for
    /// `delay_seconds`.
    FloodControlIssues { delay_seconds: f64 },
    /// The scheduler exited but background threads did not terminate
    /// within the grace window.
    ThreadingFailedShutdown,
}

/// Supervisor → worker commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Downward {
    /// `force = false`: stop polling the chat transport and unwind the
    /// scheduler gracefully. `force = true`: raise a fatal signal inside
    /// the worker's event loop.
    ShutDown { force: bool },
}

/// Write one message as a line of JSON, the write side of the protocol
/// both processes use (worker writing `Upward` on its own stdout,
/// supervisor writing `Downward` on the worker child's stdin).
pub async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| Error::Worker(format!("failed to write IPC message: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Worker(format!("failed to flush IPC message: {e}")))
}

/// Listens for newline-delimited JSON messages of type `T` on any async
/// byte stream — a child's stdout (supervisor side) or this process's own
/// stdin (worker side) — the moral equivalent of `ConnectionListener.listen`
/// but reading a pipe of bytes rather than pickled Python values.
pub struct ConnectionListener<T, R> {
    lines: Mutex<Lines<BufReader<R>>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: for<'de> Deserialize<'de>, R: AsyncRead + Unpin> ConnectionListener<T, R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(reader).lines()),
            _marker: std::marker::PhantomData,
        }
    }

    /// Receive the next message, or `None` once the child has closed its
    /// stdout (i.e. exited).
    pub async fn recv(&self) -> Result<Option<T>> {
        let mut lines = self.lines.lock().await;
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::Worker(format!("IPC read failed: {e}")))?
        else {
            return Ok(None);
        };
        let message = serde_json::from_str(&line)?;
        Ok(Some(message))
    }

    /// Drive `handler` for every message until the channel closes
    /// (`ConnectionListener.listen`'s `while True` loop).
    pub async fn listen<F, Fut>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(T) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        while let Some(message) = self.recv().await? {
            handler(message).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upward_tags_round_trip() {
        let messages = [
            Upward::CleanShutdown,
            Upward::ExceptionShutdown {
                error: "boom".to_string(),
            },
            Upward::FloodControlIssues { delay_seconds: 5.0 },
            Upward::ThreadingFailedShutdown,
        ];
        for message in messages {
            let json = serde_json::to_string(&message).unwrap();
            let parsed: Upward = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, message);
        }
    }

    #[test]
    fn test_downward_tags_round_trip() {
        for force in [false, true] {
            let message = Downward::ShutDown { force };
            let json = serde_json::to_string(&message).unwrap();
            let parsed: Downward = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, message);
        }
    }
}
