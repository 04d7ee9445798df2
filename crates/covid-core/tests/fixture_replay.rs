//! Replays the checked-in fixtures through the factory, the way the
//! interactive mode runs offline.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use covid_core::fetcher::FixtureFetcher;
use covid_core::render::TemplateRenderer;
use covid_core::{
    AppError, CaseCounts, Country, DailyUpdateConfig, FailurePolicy, FetcherKind, ImageFetcher,
    ImageInterpreter, Payload, Publisher, RunContext, ScraperFactory, ScraperKind, Selector,
    Transport, daily_update,
};

/// The workspace-level tree `covid-bot run` reads by default.
fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
}

/// Reads the chart by checking it is the fixture PNG.
struct FixtureChartReader;

#[async_trait]
impl ImageInterpreter for FixtureChartReader {
    async fn interpret(&self, image: &[u8]) -> Result<CaseCounts, AppError> {
        if !image.starts_with(b"\x89PNG") {
            return Err(AppError::InterpretError("not a PNG".into()));
        }
        Ok(CaseCounts {
            confirmed: 507,
            recovered: 42,
            deceased: 4,
            confirmed_cumulative: 7255,
            recovered_cumulative: 762,
            deceased_cumulative: 102,
        })
    }
}

/// Transport that records requests and never answers successfully.
#[derive(Clone, Default)]
struct RecordingTransport {
    requests: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn get(&self, url: &str) -> Result<Payload, AppError> {
        self.requests.lock().unwrap().push(url.to_string());
        Err(AppError::FetchError(format!("offline: {url}")))
    }
}

struct Collect(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Publisher for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    async fn publish(&self, text: &str) -> Result<(), AppError> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn indonesia_update_normalizes_and_is_deterministic() {
    let factory = ScraperFactory::new(fixture_dir());
    let scraper = factory
        .create(ScraperKind::Parsed, FetcherKind::Fixture, Country::Indonesia, "covid19goid")
        .unwrap_or_else(|e| panic!("{e}"));

    let first = scraper.scrape().await.unwrap();
    let second = scraper.scrape().await.unwrap();
    assert_eq!(first, second);

    assert_eq!(first.country, "Indonesia");
    assert_eq!(first.country_id, Country::Indonesia);
    assert_eq!(first.confirmed, 10);
    assert_eq!(first.deceased, 1);
    assert_eq!(first.recovered, 5);
    assert_eq!(first.confirmed_cumulative, 1000);
    assert_eq!(first.deceased_cumulative, 50);
    assert_eq!(first.recovered_cumulative, 300);
    assert_eq!(
        first.date_time,
        Utc.with_ymd_and_hms(2020, 4, 1, 10, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn japan_summary_takes_latest_day() {
    let factory = ScraperFactory::new(fixture_dir());
    let summary = factory
        .create_named("parsed", "fixture", "jp", "covid19japan")
        .unwrap_or_else(|e| panic!("{e}"))
        .scrape()
        .await
        .unwrap();

    assert_eq!(summary.confirmed, 507);
    assert_eq!(summary.confirmed_cumulative, 7118);
    assert_eq!(
        summary.date_time,
        Utc.with_ymd_and_hms(2020, 4, 12, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn mhlw_feed_walk_reaches_chart() {
    let factory = ScraperFactory::new(fixture_dir()).with_interpreter(Arc::new(FixtureChartReader));
    let scraper = factory
        .create(ScraperKind::Image, FetcherKind::Fixture, Country::Japan, "mhlw")
        .unwrap_or_else(|e| panic!("{e}"));

    let first = scraper.scrape().await.unwrap();
    let second = scraper.scrape().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.country_id, Country::Japan);
    assert_eq!(first.confirmed_cumulative, 7255);
    assert_eq!(
        first.date_time,
        Utc.with_ymd_and_hms(2020, 4, 12, 3, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn mhlw_without_interpreter_fails_after_fetching() {
    let factory = ScraperFactory::new(fixture_dir());
    let err = factory
        .create(ScraperKind::Image, FetcherKind::Fixture, Country::Japan, "mhlw")
        .unwrap_or_else(|e| panic!("{e}"))
        .scrape()
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConfigError(_)));
}

#[tokio::test]
async fn fixture_names_derive_from_last_url_segment() {
    let fetcher = FixtureFetcher::new(fixture_dir(), Country::Japan, "mhlw", "news.rdf");
    let a = fetcher
        .image("https://www.mhlw.go.jp/content/10906000/000620394.png")
        .await
        .unwrap();
    let b = fetcher
        .image("http://mirror.example/archive/2020/000620394.png?cache=1")
        .await
        .unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn image_dispatch_for_unimplemented_country_never_fetches() {
    let transport = RecordingTransport::default();
    let factory = ScraperFactory::new(fixture_dir()).with_transport(Arc::new(transport.clone()));

    let err = factory
        .create(ScraperKind::Image, FetcherKind::Http, Country::Indonesia, "covid19goid")
        .err()
        .unwrap();
    assert!(matches!(err, AppError::NotImplemented(_)));
    assert!(transport.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn full_cycle_publishes_both_countries() {
    let factory = ScraperFactory::new(fixture_dir());
    let renderer = TemplateRenderer::new("{{country}} {{date}}: +{{confirmed}}");
    let sink = Arc::new(Mutex::new(Vec::new()));
    let publishers: Vec<Box<dyn Publisher>> = vec![Box::new(Collect(Arc::clone(&sink)))];
    let config = DailyUpdateConfig {
        sources: Selector::parse_list(
            "parsed:jp:covid19japan,parsed:id:covid19goid",
            FetcherKind::Fixture,
        )
        .unwrap(),
        failure_policy: FailurePolicy::Abort,
    };

    let ctx = RunContext::new(Duration::from_secs(30));
    let report = daily_update(&ctx, &factory, &renderer, &publishers, &config)
        .await
        .unwrap();

    let expected = "Japan 2020-04-12: +507\n\nIndonesia 2020-04-01: +10";
    assert_eq!(report.text, expected);
    assert_eq!(sink.lock().unwrap().as_slice(), [expected]);
}
