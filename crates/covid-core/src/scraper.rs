use async_trait::async_trait;

use crate::error::AppError;
use crate::factory::ParsedFetcher;
use crate::models::DailySummary;
use crate::traits::Scraper;

/// Scraper for sources whose feed already holds the numbers.
///
/// Fetch the feed, decode it with the source's schema, normalize.
pub struct ParsedScraper {
    fetcher: ParsedFetcher,
}

impl ParsedScraper {
    pub fn new(fetcher: ParsedFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Scraper for ParsedScraper {
    fn source(&self) -> String {
        self.fetcher.source()
    }

    async fn scrape(&self) -> Result<DailySummary, AppError> {
        let payload = self.fetcher.fetcher.feed().await?;
        let origin = payload.origin().to_string();
        let body = payload.into_bytes().await?;
        tracing::debug!(%origin, bytes = body.len(), "Fetched feed");

        let summary = (self.fetcher.decode)(&body)?;
        tracing::info!(
            %origin,
            country = %summary.country_id,
            date_time = %summary.date_time,
            "Normalized summary"
        );
        Ok(summary)
    }
}
