use std::io::Read;
use std::path::Path;

use covid_client::DiscordConfig;
use covid_core::{AppError, FetcherKind, Selector};
use serde::Deserialize;

/// Payload handed to the bot by a scheduler in managed-event mode.
///
/// ```json
/// {"discord": {"bot_token": "...", "channel_ids": ["123"]}, "sources": ["parsed:id:covid19goid"]}
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct EventPayload {
    /// Overrides `DISCORD_*` environment variables when present.
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl EventPayload {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("invalid event payload: {e}")))
    }

    /// Read a payload from a file, or from stdin when `path` is `-`.
    pub fn read(path: &Path) -> Result<Self, AppError> {
        let raw = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| AppError::ConfigError(format!("reading event from stdin: {e}")))?;
            buf
        } else {
            std::fs::read_to_string(path).map_err(|e| {
                AppError::ConfigError(format!("reading event {}: {e}", path.display()))
            })?
        };
        Self::from_json(&raw)
    }

    /// Selectors named by the event, or `default` when it names none.
    pub fn selectors(&self, default: &str) -> Result<Vec<Selector>, AppError> {
        if self.sources.is_empty() {
            return Selector::parse_list(default, FetcherKind::Http);
        }
        self.sources
            .iter()
            .map(|s| Selector::parse(s, FetcherKind::Http))
            .collect()
    }

    pub fn discord_config(&self) -> Result<DiscordConfig, AppError> {
        match &self.discord {
            Some(config) => Ok(config.clone()),
            None => DiscordConfig::from_env(),
        }
    }
}
