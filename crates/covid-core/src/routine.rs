use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::factory::{ScraperFactory, Selector};
use crate::models::DailySummary;
use crate::publisher::publish_all;
use crate::traits::{Publisher, Renderer};

/// What a single failing source does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// First error fails the whole run; nothing is published.
    #[default]
    Abort,
    /// Log the failure and report on the sources that succeeded.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(AppError::ConfigError(format!(
                "unknown failure policy '{other}' (expected abort or skip)"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Skip => "skip",
        })
    }
}

/// Per-invocation state: identity, deadline, cancellation.
///
/// Passed explicitly so repeated or concurrent runs never share state.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    cancel: CancellationToken,
    budget: Duration,
    deadline: Instant,
}

impl RunContext {
    pub fn new(budget: Duration) -> Self {
        Self::with_token(CancellationToken::new(), budget)
    }

    pub fn with_token(cancel: CancellationToken, budget: Duration) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancel,
            budget,
            deadline: Instant::now() + budget,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Run `fut` unless the run is cancelled or out of time first; the
    /// losing future is dropped, which aborts any in-flight retrieval.
    pub async fn guard<T>(
        &self,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(AppError::Timeout(self.budget.as_secs())),
            res = fut => res,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DailyUpdateConfig {
    pub sources: Vec<Selector>,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug)]
pub struct SourceFailure {
    pub selector: Selector,
    pub error: AppError,
}

/// Outcome of one fetch → normalize → render → publish cycle.
#[derive(Debug)]
pub struct DailyUpdateReport {
    pub summaries: Vec<DailySummary>,
    /// Only populated under [`FailurePolicy::Skip`].
    pub failures: Vec<SourceFailure>,
    pub text: String,
    pub delivered: usize,
}

/// Scrape every configured source in order, render one report, publish it.
pub async fn daily_update(
    ctx: &RunContext,
    factory: &ScraperFactory,
    renderer: &dyn Renderer,
    publishers: &[Box<dyn Publisher>],
    config: &DailyUpdateConfig,
) -> Result<DailyUpdateReport, AppError> {
    let span = tracing::info_span!("daily_update", run_id = %ctx.run_id);
    async move {
        if config.sources.is_empty() {
            return Err(AppError::ConfigError("no sources configured".into()));
        }

        let mut summaries = Vec::with_capacity(config.sources.len());
        let mut failures = Vec::new();

        for selector in &config.sources {
            match scrape_one(ctx, factory, selector).await {
                Ok(summary) => summaries.push(summary),
                Err(e @ (AppError::Cancelled | AppError::Timeout(_))) => return Err(e),
                Err(e) if config.failure_policy == FailurePolicy::Abort => {
                    tracing::error!(
                        %selector,
                        kind = e.kind(),
                        dispatch = e.is_dispatch_error(),
                        error = %e,
                        "Source failed, aborting run"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(%selector, kind = e.kind(), error = %e, "Source failed, skipping");
                    failures.push(SourceFailure {
                        selector: selector.clone(),
                        error: e,
                    });
                }
            }
        }

        if summaries.is_empty() {
            // Every source was skipped; surface the first cause.
            let first = failures.remove(0);
            return Err(first.error);
        }

        let text = renderer.render(&summaries)?;
        let delivered = ctx.guard(publish_all(publishers, &text)).await?;
        tracing::info!(
            summaries = summaries.len(),
            skipped = failures.len(),
            delivered,
            remaining_secs = ctx.remaining().as_secs(),
            "Daily update complete"
        );

        Ok(DailyUpdateReport {
            summaries,
            failures,
            text,
            delivered,
        })
    }
    .instrument(span)
    .await
}

async fn scrape_one(
    ctx: &RunContext,
    factory: &ScraperFactory,
    selector: &Selector,
) -> Result<DailySummary, AppError> {
    let scraper = factory.create_for(selector)?;
    tracing::info!(%selector, source = %scraper.source(), "Scraping");
    ctx.guard(scraper.scrape()).await
}
