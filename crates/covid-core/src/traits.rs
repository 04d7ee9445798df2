use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{CaseCounts, DailySummary, Payload};

/// Retrieves the primary document of a source without interpreting it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Where this fetcher reads from: a local directory or a base URL.
    fn source(&self) -> String;

    /// The source's feed or API root document.
    async fn feed(&self) -> Result<Payload, AppError>;
}

/// A fetcher that can also follow identifiers found inside the feed.
#[async_trait]
pub trait ImageFetcher: Fetcher {
    /// Secondary document (e.g. a detail page) referenced by the feed.
    async fn news(&self, id: &str) -> Result<Payload, AppError>;

    /// Binary image content, read in full.
    async fn image(&self, id: &str) -> Result<Vec<u8>, AppError>;
}

/// Performs a single GET for the remote fetcher.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Payload, AppError>;
}

/// Produces one normalized summary from a source.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// The underlying fetcher's source, for logs.
    fn source(&self) -> String;

    async fn scrape(&self) -> Result<DailySummary, AppError>;
}

/// Reads the six counters off a published chart image.
#[async_trait]
pub trait ImageInterpreter: Send + Sync {
    async fn interpret(&self, image: &[u8]) -> Result<CaseCounts, AppError>;
}

/// Turns summaries into report text.
pub trait Renderer: Send + Sync {
    fn render(&self, summaries: &[DailySummary]) -> Result<String, AppError>;
}

/// An output channel for finished reports.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, text: &str) -> Result<(), AppError>;
}

/// Interpreter used when no chart reader is configured.
///
/// Image sources still dispatch and fetch, then fail at interpretation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredInterpreter;

#[async_trait]
impl ImageInterpreter for UnconfiguredInterpreter {
    async fn interpret(&self, image: &[u8]) -> Result<CaseCounts, AppError> {
        Err(AppError::ConfigError(format!(
            "no image interpreter configured ({} bytes left unread)",
            image.len()
        )))
    }
}
