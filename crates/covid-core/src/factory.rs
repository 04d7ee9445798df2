//! Selector resolution: (scraper kind, fetcher kind, country, source) →
//! a wired [`Scraper`].
//!
//! Dispatch failures are kept distinct:
//! - [`AppError::NotFound`]: the selector names something that does not exist.
//! - [`AppError::NotImplemented`]: the selector is valid but nobody has built it.
//! - [`AppError::InvalidFetcher`]: the fetcher built for a source lacks the
//!   capabilities its scraper needs (a catalogue/registry wiring mistake).

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::country::Country;
use crate::error::AppError;
use crate::fetcher::{FixtureFetcher, RemoteFetcher};
use crate::scraper::ParsedScraper;
use crate::sources::{self, DecodeFn, SOURCES, SourceFormat, SourceSpec};
use crate::sources::jp::mhlw::MhlwScraper;
use crate::traits::{
    Fetcher, ImageFetcher, ImageInterpreter, Scraper, Transport, UnconfiguredInterpreter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScraperKind {
    Parsed,
    Image,
}

impl ScraperKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScraperKind::Parsed => "parsed",
            ScraperKind::Image => "image",
        }
    }
}

impl fmt::Display for ScraperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScraperKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parsed" => Ok(ScraperKind::Parsed),
            "image" => Ok(ScraperKind::Image),
            other => Err(AppError::NotFound(format!("unknown scraper kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetcherKind {
    /// Pre-recorded payloads from the fixture directory.
    Fixture,
    /// Live network retrieval.
    Http,
}

impl FetcherKind {
    pub const ALL: [FetcherKind; 2] = [FetcherKind::Fixture, FetcherKind::Http];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetcherKind::Fixture => "fixture",
            FetcherKind::Http => "http",
        }
    }
}

impl fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetcherKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixture" => Ok(FetcherKind::Fixture),
            "http" | "live" => Ok(FetcherKind::Http),
            other => Err(AppError::NotFound(format!("unknown fetcher kind '{other}'"))),
        }
    }
}

/// Everything the factory needs to pick a scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub scraper_kind: ScraperKind,
    pub fetcher_kind: FetcherKind,
    pub country: Country,
    pub source: String,
}

impl Selector {
    pub fn new(
        scraper_kind: ScraperKind,
        fetcher_kind: FetcherKind,
        country: Country,
        source: impl Into<String>,
    ) -> Self {
        Self {
            scraper_kind,
            fetcher_kind,
            country,
            source: source.into(),
        }
    }

    /// Parse `kind:country:source` (e.g. `image:jp:mhlw`).
    pub fn parse(spec: &str, fetcher_kind: FetcherKind) -> Result<Self, AppError> {
        let parts: Vec<&str> = spec.trim().split(':').map(str::trim).collect();
        let [kind, country, source] = parts.as_slice() else {
            return Err(AppError::NotFound(format!(
                "malformed selector '{spec}' (expected kind:country:source)"
            )));
        };
        if source.is_empty() {
            return Err(AppError::NotFound(format!("selector '{spec}' names no source")));
        }
        Ok(Self::new(
            kind.parse()?,
            fetcher_kind,
            country.parse()?,
            source.to_ascii_lowercase(),
        ))
    }

    /// Parse a comma-separated selector list; blank entries are skipped.
    pub fn parse_list(list: &str, fetcher_kind: FetcherKind) -> Result<Vec<Self>, AppError> {
        list.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| Self::parse(s, fetcher_kind))
            .collect()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} ({})",
            self.scraper_kind,
            self.country.code().to_ascii_lowercase(),
            self.source,
            self.fetcher_kind
        )
    }
}

/// A fetcher paired with the decoder for its feed schema.
pub struct ParsedFetcher {
    pub fetcher: Box<dyn Fetcher>,
    pub decode: DecodeFn,
}

impl ParsedFetcher {
    pub fn source(&self) -> String {
        self.fetcher.source()
    }
}

/// What the fetcher factory built, tagged by capability.
pub enum FetcherHandle {
    Parsed(ParsedFetcher),
    Image(Box<dyn ImageFetcher>),
}

impl FetcherHandle {
    pub fn source(&self) -> String {
        match self {
            FetcherHandle::Parsed(p) => p.source(),
            FetcherHandle::Image(f) => f.source(),
        }
    }
}

/// Builds fetchers for catalogued sources.
#[derive(Clone)]
pub struct FetcherFactory {
    fixture_dir: PathBuf,
    transport: Option<Arc<dyn Transport>>,
}

impl FetcherFactory {
    pub fn new(fixture_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixture_dir: fixture_dir.into(),
            transport: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    fn raw(&self, kind: FetcherKind, spec: &SourceSpec) -> Result<Box<dyn ImageFetcher>, AppError> {
        match kind {
            FetcherKind::Fixture => Ok(Box::new(FixtureFetcher::new(
                &self.fixture_dir,
                spec.country,
                spec.name,
                spec.feed,
            ))),
            FetcherKind::Http => {
                let transport = self.transport.clone().ok_or_else(|| {
                    AppError::ConfigError("no HTTP transport configured".into())
                })?;
                Ok(Box::new(RemoteFetcher::new(transport, spec.base_url, spec.feed)?))
            }
        }
    }

    /// Build the fetcher for a source, tagged with what its format supports.
    pub fn build(
        &self,
        kind: FetcherKind,
        country: Country,
        source: &str,
    ) -> Result<FetcherHandle, AppError> {
        let spec = sources::lookup(country, source)
            .ok_or_else(|| AppError::NotFound(format!("no source '{source}' for {country}")))?;
        let fetcher = self.raw(kind, spec)?;
        Ok(match spec.format {
            SourceFormat::Json(decode) => FetcherHandle::Parsed(ParsedFetcher { fetcher, decode }),
            SourceFormat::ImageFeed => FetcherHandle::Image(fetcher),
        })
    }

    pub fn parsed_fetcher(
        &self,
        kind: FetcherKind,
        country: Country,
        source: &str,
    ) -> Result<ParsedFetcher, AppError> {
        match self.build(kind, country, source)? {
            FetcherHandle::Parsed(parsed) => Ok(parsed),
            FetcherHandle::Image(fetcher) => Err(AppError::InvalidFetcher(format!(
                "{} serves an image feed; a parsed scraper needs a JSON schema",
                fetcher.source()
            ))),
        }
    }

    pub fn image_fetcher(
        &self,
        kind: FetcherKind,
        country: Country,
        source: &str,
    ) -> Result<FetcherHandle, AppError> {
        self.build(kind, country, source)
    }
}

/// Builds a country's image scraper from whatever the fetcher factory produced.
pub type ImageScraperCtor =
    fn(FetcherHandle, Arc<dyn ImageInterpreter>) -> Result<Box<dyn Scraper>, AppError>;

/// Country → image scraper constructor.
#[derive(Clone)]
pub struct ImageScraperRegistry {
    entries: HashMap<Country, ImageScraperCtor>,
}

impl ImageScraperRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, country: Country, ctor: ImageScraperCtor) -> &mut Self {
        self.entries.insert(country, ctor);
        self
    }

    pub fn get(&self, country: Country) -> Option<ImageScraperCtor> {
        self.entries.get(&country).copied()
    }
}

impl Default for ImageScraperRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Country::Japan, MhlwScraper::from_handle);
        registry
    }
}

/// Single entry point for turning selectors into scrapers.
#[derive(Clone)]
pub struct ScraperFactory {
    fetchers: FetcherFactory,
    image_scrapers: ImageScraperRegistry,
    interpreter: Arc<dyn ImageInterpreter>,
}

impl ScraperFactory {
    pub fn new(fixture_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetchers: FetcherFactory::new(fixture_dir),
            image_scrapers: ImageScraperRegistry::default(),
            interpreter: Arc::new(UnconfiguredInterpreter),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.fetchers = self.fetchers.with_transport(transport);
        self
    }

    pub fn with_interpreter(mut self, interpreter: Arc<dyn ImageInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_registry(mut self, registry: ImageScraperRegistry) -> Self {
        self.image_scrapers = registry;
        self
    }

    pub fn create(
        &self,
        scraper_kind: ScraperKind,
        fetcher_kind: FetcherKind,
        country: Country,
        source: &str,
    ) -> Result<Box<dyn Scraper>, AppError> {
        match scraper_kind {
            ScraperKind::Parsed => self.parsed_scraper(fetcher_kind, country, source),
            ScraperKind::Image => self.image_scraper(fetcher_kind, country, source),
        }
    }

    /// [`create`](Self::create) from untyped names, as they come from config.
    pub fn create_named(
        &self,
        scraper_kind: &str,
        fetcher_kind: &str,
        country: &str,
        source: &str,
    ) -> Result<Box<dyn Scraper>, AppError> {
        let scraper_kind: ScraperKind = scraper_kind.parse()?;
        let fetcher_kind: FetcherKind = fetcher_kind.parse()?;
        let country: Country = country.parse()?;
        self.create(scraper_kind, fetcher_kind, country, source)
    }

    pub fn create_for(&self, selector: &Selector) -> Result<Box<dyn Scraper>, AppError> {
        self.create(
            selector.scraper_kind,
            selector.fetcher_kind,
            selector.country,
            &selector.source,
        )
    }

    pub fn parsed_scraper(
        &self,
        fetcher_kind: FetcherKind,
        country: Country,
        source: &str,
    ) -> Result<Box<dyn Scraper>, AppError> {
        let fetcher = self.fetchers.parsed_fetcher(fetcher_kind, country, source)?;
        Ok(Box::new(ParsedScraper::new(fetcher)))
    }

    /// The country's registry entry is checked before any fetcher is built.
    pub fn image_scraper(
        &self,
        fetcher_kind: FetcherKind,
        country: Country,
        source: &str,
    ) -> Result<Box<dyn Scraper>, AppError> {
        let ctor = self.image_scrapers.get(country).ok_or_else(|| {
            AppError::NotImplemented(format!("image scraping for {}", country.name()))
        })?;
        let fetcher = self.fetchers.image_fetcher(fetcher_kind, country, source)?;
        ctor(fetcher, Arc::clone(&self.interpreter))
    }

    /// Every selector this factory can resolve.
    pub fn supported(&self) -> Vec<Selector> {
        let mut out = Vec::new();
        for spec in SOURCES {
            let scraper_kind = match spec.format {
                SourceFormat::Json(_) => ScraperKind::Parsed,
                SourceFormat::ImageFeed if self.image_scrapers.get(spec.country).is_some() => {
                    ScraperKind::Image
                }
                SourceFormat::ImageFeed => continue,
            };
            for fetcher_kind in FetcherKind::ALL {
                out.push(Selector::new(scraper_kind, fetcher_kind, spec.country, spec.name));
            }
        }
        out
    }
}
