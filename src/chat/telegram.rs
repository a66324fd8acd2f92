//! A [`ChatSink`] backed by real Telegram Bot API calls.
//!
//! The chat transport SDK itself is out of scope, but the persistent
//! settings already carry a worker bot token file and a primary chat id,
//! so the bot this crate talks to is Telegram specifically. This is the
//! minimal concrete edge: plain HTTP calls against the Bot API, grounded
//! in `enrichment/musicbrainz/client.rs`'s `reqwest::Client` +
//! status-code-match shape, generalized from a JSON body to Telegram's
//! `{ok, result}` / `{ok, description, parameters}` envelope. Query
//! parameters are percent-encoded by hand (`urlencoding`) rather than via
//! `reqwest`'s own form encoding, the way a bare `requests.get(url, params=)`
//! call would in the original `further_bot.py`.
//!
//! Every call is wrapped by [`retry::retry`] under [`RetryPolicy::FloodControl`],
//! so a Telegram `429 Too Many Requests` surfaces through the same
//! recovery-id-logged backoff path any other outbound API call does.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChatSink, MessageId};
use crate::config::SharedSettings;
use crate::error::{Error, Result};
use crate::retry::{self, FloodControlError, FloodControlReporter, RetryPolicy};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ErrorParameters>,
}

#[derive(Debug, Deserialize)]
struct ErrorParameters {
    #[serde(default)]
    retry_after: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// One failed Telegram API call. Carries `retry_after` only when the
/// failure was a `429` that told us how long to wait — anything else is
/// not retryable under [`RetryPolicy::FloodControl`] and escapes
/// immediately.
#[derive(Debug)]
pub struct TelegramApiError {
    description: String,
    retry_after: Option<Duration>,
}

impl std::fmt::Display for TelegramApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "telegram API error: {}", self.description)
    }
}

impl std::error::Error for TelegramApiError {}

impl FloodControlError for TelegramApiError {
    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Percent-encode one query parameter value the way a bare `GET` against
/// the Bot API needs (spaces, `&`, `=`, unicode message text, etc).
fn encode_param(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Bound to a single chat id — the settings' `registered_primary_chat_id`.
pub struct TelegramChatSink {
    client: reqwest::Client,
    token: String,
    chat_id: i64,
    settings: SharedSettings,
    reporter: Option<Arc<dyn FloodControlReporter>>,
}

impl TelegramChatSink {
    pub fn new(token: impl Into<String>, chat_id: i64, settings: SharedSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            chat_id,
            settings,
            reporter: None,
        }
    }

    /// Attach an upward-event reporter so a `429` surfaces as
    /// `Upward::FloodControlIssues` when a supervisor channel is available.
    pub fn with_reporter(mut self, reporter: Arc<dyn FloodControlReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    fn url(&self, method: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{API_BASE}/bot{}/{method}", self.token);
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&encode_param(value));
        }
        url
    }

    async fn call_once<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, TelegramApiError> {
        let url = self.url(method, params);
        let response = self.client.get(&url).send().await.map_err(|e| TelegramApiError {
            description: format!("request failed: {e}"),
            retry_after: None,
        })?;
        let status = response.status();

        let envelope: Envelope<T> = response.json().await.map_err(|e| TelegramApiError {
            description: format!("couldn't parse response: {e}"),
            retry_after: None,
        })?;

        if envelope.ok {
            return envelope.result.ok_or_else(|| TelegramApiError {
                description: "ok response carried no result".to_string(),
                retry_after: None,
            });
        }

        let retry_after = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            envelope
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs_f64)
        } else {
            None
        };

        Err(TelegramApiError {
            description: envelope.description.unwrap_or_else(|| format!("HTTP {status}")),
            retry_after,
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: Vec<(&str, String)>) -> Result<T> {
        let settings = self.settings.get().await;
        let reporter = self.reporter.as_deref();
        retry::retry(RetryPolicy::FloodControl, &settings, reporter, || {
            let params = params.clone();
            async move { self.call_once(method, &params).await }
        })
        .await
        .map_err(|e| Error::Transient(e.to_string()))
    }
}

#[async_trait]
impl ChatSink for TelegramChatSink {
    async fn send_message(&self, text: &str) -> Result<MessageId> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                vec![("chat_id", self.chat_id.to_string()), ("text", text.to_string())],
            )
            .await?;
        Ok(MessageId(sent.message_id.to_string()))
    }

    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                vec![
                    ("chat_id", self.chat_id.to_string()),
                    ("message_id", id.0.clone()),
                    ("text", text.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn pin_message(&self, id: &MessageId) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "pinChatMessage",
                vec![("chat_id", self.chat_id.to_string()), ("message_id", id.0.clone())],
            )
            .await?;
        Ok(())
    }

    async fn unpin_message(&self, id: &MessageId) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "unpinChatMessage",
                vec![("chat_id", self.chat_id.to_string()), ("message_id", id.0.clone())],
            )
            .await?;
        Ok(())
    }

    async fn delete_message(&self, id: &MessageId) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "deleteMessage",
                vec![("chat_id", self.chat_id.to_string()), ("message_id", id.0.clone())],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_param_escapes_reserved_characters() {
        assert_eq!(encode_param("hello world"), "hello%20world");
        assert_eq!(encode_param("a&b=c"), "a%26b%3Dc");
    }

    #[test]
    fn test_url_builds_query_string_in_order() {
        let sink = TelegramChatSink::new("TOKEN", 42, SharedSettings::load_from_disk());
        let url = sink.url("sendMessage", &[("chat_id", "42".to_string()), ("text", "hi there".to_string())]);
        assert_eq!(
            url,
            "https://api.telegram.org/botTOKEN/sendMessage?chat_id=42&text=hi%20there"
        );
    }

    #[test]
    fn test_envelope_parses_success_and_failure() {
        let ok: Envelope<SentMessage> = serde_json::from_str(r#"{"ok":true,"result":{"message_id":7}}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.result.unwrap().message_id, 7);

        let err: Envelope<SentMessage> = serde_json::from_str(
            r#"{"ok":false,"description":"Too Many Requests","parameters":{"retry_after":3}}"#,
        )
        .unwrap();
        assert!(!err.ok);
        assert_eq!(err.parameters.unwrap().retry_after, Some(3.0));
    }

    #[test]
    fn test_flood_control_error_carries_retry_after() {
        let err = TelegramApiError {
            description: "Too Many Requests".to_string(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert!(err.to_string().contains("Too Many Requests"));
    }
}
