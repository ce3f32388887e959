//! Telegram Bot API notifier (`sendMessage` with HTML parse mode)

use crate::config::TelegramConfig;
use crate::domain::errors::NotifierError;
use crate::domain::ports::Notifier;
use crate::infrastructure::core::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
    first_name: String,
}

pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: HttpClientFactory::create_plain_client(SEND_TIMEOUT),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    fn ensure_configured(&self) -> Result<(), NotifierError> {
        if self.chat_id == 0 {
            return Err(NotifierError::NotConfigured {
                reason: "TELEGRAM_CHAT_ID is not set".to_string(),
            });
        }
        Ok(())
    }
}

/// Turns a Bot API reply into its `result`, or a `Rejected` error carrying Telegram's description
fn parse_response<T: serde::de::DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<Option<T>, NotifierError> {
    match serde_json::from_str::<ApiResponse<T>>(body) {
        Ok(response) if response.ok && (200..300).contains(&status) => Ok(response.result),
        Ok(response) => Err(NotifierError::Rejected {
            reason: format!(
                "HTTP {} (error_code {}): {}",
                status,
                response
                    .error_code
                    .map_or_else(|| "-".to_string(), |c| c.to_string()),
                response.description.unwrap_or_default()
            ),
        }),
        Err(_) => Err(NotifierError::Rejected {
            reason: format!("HTTP {}: unexpected response body", status),
        }),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.ensure_configured()?;

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .context("Failed to reach Telegram")?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read Telegram response")?;
        parse_response::<serde_json::Value>(status, &body)?;

        debug!("TelegramNotifier: Message delivered to chat {}", self.chat_id);
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .context("Failed to reach Telegram")?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read Telegram response")?;
        let bot = parse_response::<BotUser>(status, &body)?.ok_or_else(|| {
            NotifierError::Rejected {
                reason: "getMe returned no bot".to_string(),
            }
        })?;

        info!(
            "TelegramNotifier: Connected as @{} ({})",
            bot.username.as_deref().unwrap_or("unknown"),
            bot.first_name
        );
        self.ensure_configured()?;
        Ok(())
    }
}
