use std::time::Duration;

use async_trait::async_trait;
use covid_core::error::AppError;
use covid_core::traits::Publisher;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord rejects message content longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Bot credentials and target channels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

impl DiscordConfig {
    /// Read configuration from environment variables.
    ///
    /// - `DISCORD_BOT_TOKEN` (required)
    /// - `DISCORD_CHANNEL_IDS` (required, comma-separated)
    pub fn from_env() -> Result<Self, AppError> {
        let bot_token = std::env::var("DISCORD_BOT_TOKEN")
            .map_err(|_| AppError::ConfigError("DISCORD_BOT_TOKEN not set".into()))?;
        let channels = std::env::var("DISCORD_CHANNEL_IDS")
            .map_err(|_| AppError::ConfigError("DISCORD_CHANNEL_IDS not set".into()))?;

        Ok(Self {
            bot_token,
            channel_ids: parse_channel_ids(&channels),
        })
    }
}

pub fn parse_channel_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Broadcasts reports to Discord channels through the REST API.
///
/// A channel that rejects the message is logged and skipped; the publish
/// only fails when no channel accepted it.
#[derive(Clone)]
pub struct DiscordPublisher {
    client: Client,
    api_base: String,
    token: String,
    channel_ids: Vec<String>,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl DiscordPublisher {
    pub fn new(config: &DiscordConfig) -> Result<Self, AppError> {
        if config.bot_token.trim().is_empty() {
            return Err(AppError::ConfigError("Discord bot token is empty".into()));
        }
        if config.channel_ids.is_empty() {
            return Err(AppError::ConfigError("no Discord channel IDs configured".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token: config.bot_token.clone(),
            channel_ids: config.channel_ids.clone(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<(), AppError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&CreateMessage { content })
            .send()
            .await
            .map_err(|e| AppError::PublishError(format!("channel {channel_id}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(AppError::PublishError(format!(
            "channel {channel_id}: HTTP {}: {message}",
            status.as_u16()
        )))
    }
}

#[async_trait]
impl Publisher for DiscordPublisher {
    fn name(&self) -> &str {
        "discord"
    }

    async fn publish(&self, text: &str) -> Result<(), AppError> {
        let chunks = split_message(text, MESSAGE_LIMIT);
        let mut delivered = 0;
        let mut last_error = None;

        'channels: for channel_id in &self.channel_ids {
            for chunk in &chunks {
                if let Err(e) = self.send(channel_id, chunk).await {
                    tracing::warn!(%channel_id, error = %e, "Failed to send message to channel");
                    last_error = Some(e);
                    continue 'channels;
                }
            }
            delivered += 1;
        }

        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }
}

/// Split `text` into pieces of at most `limit` characters, breaking at line
/// ends where possible.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
