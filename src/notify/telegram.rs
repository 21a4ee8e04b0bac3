//! Telegram Bot API sink

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::NotificationSink;
use crate::config::TelegramConfig;
use crate::error::Error;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
}

/// Posts messages to a chat (and optional forum thread) through the Bot API
pub struct TelegramSink {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    thread_id: Option<i64>,
    enabled: bool,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let enabled =
            config.enabled && !config.bot_token.is_empty() && !config.chat_id.is_empty();

        Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            thread_id: config.thread_id,
            enabled,
        }
    }

    /// Point the sink at a different Bot API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn deliver(&self, text: &str) -> Result<(), Error> {
        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            message_thread_id: self.thread_id,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!("{}: {}", status, detail)));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send_message(&self, text: &str) {
        if !self.enabled {
            debug!("Telegram notifications disabled or bot not configured");
            return;
        }

        match self.deliver(text).await {
            Ok(()) => debug!("Telegram message sent"),
            Err(e) => warn!("Failed to send Telegram message: {}", e),
        }
    }
}
