use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Fire-and-forget channel to the human operator.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Sends operator messages through the Telegram Bot API.
pub struct TelegramNotifier {
    http_client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        Self::with_api_base("https://api.telegram.org".to_string(), bot_token, chat_id)
    }

    pub fn with_api_base(api_base: String, bot_token: String, chat_id: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            api_base,
            bot_token,
            chat_id,
        })
    }
}

#[async_trait]
impl OperatorNotifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram sendMessage returned {}: {}", status, body));
        }

        Ok(())
    }
}

/// Used when no bot token is configured: operator messages only reach the log.
pub struct LogNotifier;

#[async_trait]
impl OperatorNotifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        tracing::info!("Operator notification: {}", text);
        Ok(())
    }
}
