//! Source catalogue and per-source extraction logic.
//!
//! Every upstream the bot knows about is described by a [`SourceSpec`].
//! JSON sources carry the decoder that turns their payload into a
//! [`DailySummary`]; image-feed sources are handled by a country-specific
//! scraper registered in [`crate::factory::ImageScraperRegistry`].

pub mod id;
pub mod jp;

use crate::country::Country;
use crate::error::AppError;
use crate::models::DailySummary;

/// Decodes a whole feed body into a summary.
pub type DecodeFn = fn(&[u8]) -> Result<DailySummary, AppError>;

/// How a source's feed is read.
#[derive(Clone, Copy)]
pub enum SourceFormat {
    /// The feed itself holds the numbers.
    Json(DecodeFn),
    /// The numbers live in an image linked from a feed entry.
    ImageFeed,
}

impl std::fmt::Debug for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Json(_) => f.write_str("Json"),
            SourceFormat::ImageFeed => f.write_str("ImageFeed"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SourceSpec {
    pub country: Country,
    pub name: &'static str,
    /// Live base URL; identifiers are resolved against it.
    pub base_url: &'static str,
    /// Feed path relative to `base_url`, also the fixture feed filename.
    pub feed: &'static str,
    pub format: SourceFormat,
}

pub static SOURCES: &[SourceSpec] = &[
    SourceSpec {
        country: Country::Japan,
        name: jp::covid19japan::SOURCE_NAME,
        base_url: "https://data.covid19japan.com/summary/",
        feed: "latest.json",
        format: SourceFormat::Json(jp::covid19japan::decode),
    },
    SourceSpec {
        country: Country::Japan,
        name: jp::mhlw::SOURCE_NAME,
        base_url: "https://www.mhlw.go.jp/stf/",
        feed: "news.rdf",
        format: SourceFormat::ImageFeed,
    },
    SourceSpec {
        country: Country::Indonesia,
        name: id::SOURCE_NAME,
        base_url: "https://data.covid19.go.id/public/api/",
        feed: "update.json",
        format: SourceFormat::Json(id::decode),
    },
];

/// Find a source by country and (case-insensitive) name.
pub fn lookup(country: Country, name: &str) -> Option<&'static SourceSpec> {
    SOURCES
        .iter()
        .find(|s| s.country == country && s.name.eq_ignore_ascii_case(name.trim()))
}
