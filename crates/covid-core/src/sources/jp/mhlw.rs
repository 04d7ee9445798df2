//! Ministry of Health, Labour and Welfare (MHLW) press feed.
//!
//! The ministry publishes its daily situation report as a press release.
//! The numbers are only available as a chart image inside the release page,
//! so scraping walks feed → release page → chart, then hands the chart to an
//! [`ImageInterpreter`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use scraper::{Html, Selector};
use url::Url;

use crate::country::Country;
use crate::error::AppError;
use crate::factory::FetcherHandle;
use crate::models::{DailySummary, parse_rfc3339_utc};
use crate::traits::{ImageFetcher, ImageInterpreter, Scraper};

pub const SOURCE_NAME: &str = "mhlw";

/// Headline shared by every situation report ("current status of COVID-19").
pub const REPORT_TITLE: &str = "新型コロナウイルス感染症の現在の状況";

/// Alt text of the domestic outbreak chart ("outbreak status").
const CHART_ALT: &str = "発生状況";

const RASTER_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".gif"];

/// One `<item>` of the RSS 1.0 / RDF feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Raw `dc:date` text.
    pub date: String,
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Link,
    Date,
}

/// Parse the items of an RDF feed. Channel metadata is skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                field = None;
                match e.local_name().as_ref() {
                    b"item" => current = Some(FeedItem::default()),
                    b"title" => field = Some(Field::Title),
                    b"link" => field = Some(Field::Link),
                    b"date" => field = Some(Field::Date),
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|e| AppError::ParseError(format!("{SOURCE_NAME} feed: {e}")))?;
                    item.push(f, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    item.push(f, &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if e.local_name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::ParseError(format!("{SOURCE_NAME} feed: {e}")));
            }
            Ok(_) => {}
        }
    }

    Ok(items)
}

impl FeedItem {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Date => &mut self.date,
        };
        target.push_str(text.trim());
    }
}

/// Pick the newest situation report. Ties keep feed order.
pub fn latest_report(items: &[FeedItem]) -> Result<(&FeedItem, DateTime<Utc>), AppError> {
    let mut best: Option<(&FeedItem, DateTime<Utc>)> = None;
    for item in items.iter().filter(|i| i.title.contains(REPORT_TITLE)) {
        let at = parse_rfc3339_utc(&item.date)?;
        if best.is_none_or(|(_, newest)| at > newest) {
            best = Some((item, at));
        }
    }

    let (item, at) = best.ok_or_else(|| {
        AppError::ExtractionError(format!(
            "{SOURCE_NAME} feed has no situation report among {} items",
            items.len()
        ))
    })?;
    if item.link.is_empty() {
        return Err(AppError::ExtractionError(format!(
            "{SOURCE_NAME} report '{}' has no link",
            item.title
        )));
    }
    Ok((item, at))
}

/// Locate the chart in a release page and return its URL, resolved against
/// the page URL when that is absolute.
pub fn find_chart(html: &str, page_url: &str) -> Result<String, AppError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("img[src]")
        .map_err(|e| AppError::ExtractionError(format!("image selector: {e}")))?;

    let candidates: Vec<(&str, &str)> = document
        .select(&selector)
        .filter_map(|el| {
            let src = el.value().attr("src")?;
            is_raster(src).then(|| (src, el.value().attr("alt").unwrap_or("")))
        })
        .collect();

    let (src, _) = candidates
        .iter()
        .find(|(_, alt)| alt.contains(CHART_ALT))
        .or_else(|| candidates.first())
        .ok_or_else(|| {
            AppError::ExtractionError(format!("no chart image found in {page_url}"))
        })?;

    Ok(match Url::parse(page_url) {
        Ok(base) => base
            .join(src)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string()),
        Err(_) => src.to_string(),
    })
}

fn is_raster(src: &str) -> bool {
    let path = src.split(['?', '#']).next().unwrap_or(src).to_ascii_lowercase();
    RASTER_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Image scraper for the MHLW press feed.
pub struct MhlwScraper {
    fetcher: Box<dyn ImageFetcher>,
    interpreter: Arc<dyn ImageInterpreter>,
}

impl MhlwScraper {
    pub fn new(fetcher: Box<dyn ImageFetcher>, interpreter: Arc<dyn ImageInterpreter>) -> Self {
        Self {
            fetcher,
            interpreter,
        }
    }

    /// Registry constructor: requires a feed-and-image capable fetcher.
    pub fn from_handle(
        handle: FetcherHandle,
        interpreter: Arc<dyn ImageInterpreter>,
    ) -> Result<Box<dyn Scraper>, AppError> {
        match handle {
            FetcherHandle::Image(fetcher) => Ok(Box::new(Self::new(fetcher, interpreter))),
            FetcherHandle::Parsed(parsed) => Err(AppError::InvalidFetcher(format!(
                "{} only serves a parsed feed; {SOURCE_NAME} needs feed, news and image retrieval",
                parsed.source()
            ))),
        }
    }
}

#[async_trait]
impl Scraper for MhlwScraper {
    fn source(&self) -> String {
        self.fetcher.source()
    }

    async fn scrape(&self) -> Result<DailySummary, AppError> {
        let feed = self.fetcher.feed().await?.into_text().await?;
        let items = parse_feed(&feed)?;
        let (item, published) = latest_report(&items)?;
        tracing::info!(title = %item.title, link = %item.link, "Found situation report");

        let page = self.fetcher.news(&item.link).await?.into_text().await?;
        let chart_url = find_chart(&page, &item.link)?;
        tracing::debug!(chart = %chart_url, "Located chart image");

        let image = self.fetcher.image(&chart_url).await?;
        tracing::info!(bytes = image.len(), "Fetched chart image");

        let counts = self.interpreter.interpret(&image).await?;
        Ok(DailySummary::new(Country::Japan, published, counts))
    }
}
