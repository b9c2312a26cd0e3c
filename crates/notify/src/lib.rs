//! propscribe chat notifier.
//!
//! Implements [`pipeline::Notifier`] for the Telegram Bot API
//! (`POST /bot{token}/sendMessage`). The channel id is the Telegram chat id,
//! e.g. `-1001234567890` for a channel or `@channel_name` for a public one.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The bot token never leaves this crate; it is omitted
//! from `Debug` output and from error messages.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ChannelId, Notifier, NotifyError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public Bot API root.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

/// Sends alerts through a Telegram bot.
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
        })
    }

    /// Points the notifier at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, channel: &ChannelId, text: &str) -> Result<(), NotifyError> {
        let body = SendMessage {
            chat_id: channel.as_str(),
            text,
            disable_web_page_preview: true,
        };
        let response = self
            .http
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            // reqwest errors embed the URL, which contains the token.
            .map_err(|e| NotifyError::Network(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let reply = response.text().await.unwrap_or_default();
        check_reply(status, &reply)?;
        debug!(%channel, "notification sent");
        Ok(())
    }
}

fn check_reply(status: u16, body: &str) -> Result<(), NotifyError> {
    match serde_json::from_str::<BotResponse>(body) {
        Ok(reply) if reply.ok => Ok(()),
        Ok(reply) => Err(NotifyError::Api {
            status: reply.error_code.unwrap_or(status),
            message: reply.description.unwrap_or_else(|| "unknown error".to_string()),
        }),
        Err(_) => Err(NotifyError::Api {
            status,
            message: body.chars().take(200).collect(),
        }),
    }
}
