// src/services/transport.rs

//! Notification transports.
//!
//! A transport sends one text message and reports rate limiting separately
//! from other failures, so the notifier can pick the right backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::NotifierConfig;
use crate::utils::http::create_api_client;

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable holding the target chat.
pub const CHAT_ENV: &str = "TELEGRAM_CHAT_ID";

/// Why a send did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint asked us to slow down
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Network failure or server-side error; worth retrying
    #[error("transient failure: {0}")]
    Transient(String),

    /// The request itself was refused; retrying will not help
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        AppError::transport(err)
    }
}

/// Send-text capability of a messaging endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, text: &str) -> std::result::Result<(), TransportError>;
}

/// Prints messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, text: &str) -> std::result::Result<(), TransportError> {
        println!("{}\n{}", "─".repeat(40), text);
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Telegram Bot API `sendMessage` transport.
pub struct TelegramTransport {
    client: Client,
    endpoint: String,
    chat_id: String,
    parse_mode: Option<String>,
}

impl TelegramTransport {
    pub fn new(
        client: Client,
        api_base: &str,
        token: &str,
        chat_id: impl Into<String>,
        parse_mode: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
            chat_id: chat_id.into(),
            parse_mode,
        }
    }

    /// Build from settings; the environment overrides the file.
    pub fn from_config(config: &NotifierConfig, timeout_secs: u64) -> Result<Self> {
        let token = credential(TOKEN_ENV, config.bot_token.as_deref())
            .ok_or_else(|| AppError::config(format!("{TOKEN_ENV} is not set")))?;
        let chat_id = credential(CHAT_ENV, config.chat_id.as_deref())
            .ok_or_else(|| AppError::config(format!("{CHAT_ENV} is not set")))?;

        Ok(Self::new(
            create_api_client(timeout_secs)?,
            &config.api_base,
            &token,
            chat_id,
            config.parse_mode.clone(),
        ))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, text: &str) -> std::result::Result<(), TransportError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
            parse_mode: self.parse_mode.as_deref(),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.without_url().to_string()))?;

        let status = resp.status().as_u16();
        let retry_header = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Transient(e.without_url().to_string()))?;

        classify(status, retry_header, &body)
    }
}

/// Map an API reply to a send outcome.
fn classify(
    status: u16,
    retry_header: Option<u64>,
    body: &str,
) -> std::result::Result<(), TransportError> {
    let reply: ApiResponse = serde_json::from_str(body).unwrap_or_default();
    if status == 200 && reply.ok {
        return Ok(());
    }

    if status == 429 || reply.error_code == Some(429) {
        let seconds = reply
            .parameters
            .and_then(|p| p.retry_after)
            .or(retry_header);
        return Err(TransportError::RateLimited {
            retry_after: seconds.map(Duration::from_secs),
        });
    }

    let detail = reply
        .description
        .unwrap_or_else(|| body.chars().take(200).collect());
    if status >= 500 {
        Err(TransportError::Transient(format!("HTTP {status}: {detail}")))
    } else {
        Err(TransportError::Rejected(format!("HTTP {status}: {detail}")))
    }
}

fn credential(env_key: &str, fallback: Option<&str>) -> Option<String> {
    std::env::var(env_key)
        .ok()
        .or_else(|| fallback.map(str::to_string))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        assert_eq!(classify(200, None, r#"{"ok":true,"result":{}}"#), Ok(()));
    }

    #[test]
    fn test_classify_rate_limit_with_hint() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
        assert_eq!(
            classify(429, None, body),
            Err(TransportError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            })
        );
    }

    #[test]
    fn test_classify_rate_limit_header_fallback() {
        assert_eq!(
            classify(429, Some(3), "slow down"),
            Err(TransportError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            })
        );
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        assert!(matches!(
            classify(502, None, "<html>Bad Gateway</html>"),
            Err(TransportError::Transient(_))
        ));
    }

    #[test]
    fn test_classify_bad_request_is_rejected() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        assert_eq!(
            classify(400, None, body),
            Err(TransportError::Rejected(
                "HTTP 400: Bad Request: chat not found".into()
            ))
        );
    }

    #[test]
    fn test_classify_ok_false_on_200() {
        assert!(matches!(
            classify(200, None, r#"{"ok":false,"description":"odd"}"#),
            Err(TransportError::Rejected(_))
        ));
    }

    #[test]
    fn test_endpoint_shape() {
        let transport = TelegramTransport::new(
            Client::new(),
            "https://api.telegram.org/",
            "123:abc",
            "42",
            None,
        );
        assert_eq!(transport.endpoint, "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[test]
    fn test_payload_omits_missing_parse_mode() {
        let payload = SendMessage {
            chat_id: "42",
            text: "merhaba",
            disable_web_page_preview: true,
            parse_mode: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["disable_web_page_preview"], true);
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn test_transport_error_converts_to_app_error() {
        let err: AppError = TransportError::Rejected("nope".into()).into();
        assert!(matches!(err, AppError::Transport(_)));
    }
}
