use super::{EnvVars, parse_or, parse_url};
use anyhow::{Result, bail};

/// Telegram Bot API configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// 0 means no destination chat has been set
    pub chat_id: i64,
    pub api_url: String,
}

impl TelegramConfig {
    pub(crate) fn from_vars(vars: &EnvVars) -> Result<Self> {
        let bot_token = vars("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            bail!("TELEGRAM_BOT_TOKEN is required");
        }

        Ok(Self {
            bot_token: bot_token.trim().to_string(),
            chat_id: parse_or(vars, "TELEGRAM_CHAT_ID", 0i64)?,
            api_url: parse_url(vars, "TELEGRAM_API_URL", "https://api.telegram.org")?,
        })
    }
}
