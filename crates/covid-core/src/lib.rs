pub mod country;
pub mod error;
pub mod factory;
pub mod fetcher;
pub mod models;
pub mod publisher;
pub mod render;
pub mod routine;
pub mod scraper;
pub mod sources;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use country::Country;
pub use error::AppError;
pub use factory::{FetcherKind, ImageScraperRegistry, ScraperFactory, ScraperKind, Selector};
pub use models::{CaseCounts, DailySummary, Payload};
pub use routine::{DailyUpdateConfig, DailyUpdateReport, FailurePolicy, RunContext, daily_update};
pub use traits::{Fetcher, ImageFetcher, ImageInterpreter, Publisher, Renderer, Scraper, Transport};
