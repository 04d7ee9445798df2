mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use covid_client::{DiscordConfig, DiscordPublisher, OpenAiChartReader, ReqwestTransport};
use covid_core::fetcher::is_fixture_root;
use covid_core::publisher::WritePublisher;
use covid_core::render::TemplateRenderer;
use covid_core::{
    DailyUpdateConfig, FailurePolicy, FetcherKind, Publisher, RunContext, ScraperFactory,
    Selector, daily_update,
};

use crate::config::EventPayload;

const DEFAULT_SOURCES: &str = "parsed:jp:covid19japan,parsed:id:covid19goid";

#[derive(Parser)]
#[command(name = "covid-bot", version, about = "Daily COVID-19 statistics bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one update cycle and print or post the report
    Run {
        /// Fetch from the live sources instead of the fixture directory
        #[arg(long, default_value_t = false)]
        live: bool,

        /// Post the report to Discord (reads DISCORD_BOT_TOKEN / DISCORD_CHANNEL_IDS)
        #[arg(long, default_value_t = false)]
        discord: bool,

        /// Comma-separated `kind:country:source` selectors
        #[arg(short, long, env = "COVID_SOURCES", default_value = DEFAULT_SOURCES)]
        sources: String,

        #[command(flatten)]
        settings: Settings,
    },

    /// Handle a scheduler event: fetch live and post to Discord
    Event {
        /// Path to the JSON event payload, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        payload: PathBuf,

        /// Sources used when the event names none
        #[arg(short, long, env = "COVID_SOURCES", default_value = DEFAULT_SOURCES)]
        sources: String,

        #[command(flatten)]
        settings: Settings,
    },

    /// List every source selector the bot can resolve
    Sources,
}

#[derive(Args)]
struct Settings {
    /// Root of the recorded payloads used in offline runs
    #[arg(long, env = "COVID_FIXTURES_DIR", default_value = "fixtures")]
    fixtures: PathBuf,

    /// Directory holding daily_update.txt
    #[arg(long, env = "COVID_TEMPLATES_DIR", default_value = "templates")]
    templates: PathBuf,

    /// Wall-clock ceiling for the whole run
    #[arg(long, env = "COVID_TIMEOUT_SECS", default_value_t = 300)]
    timeout_secs: u64,

    /// What a failing source does to the run: abort or skip
    #[arg(long, env = "COVID_FAILURE_POLICY", default_value = "abort")]
    failure_policy: FailurePolicy,

    /// API key for the chart-reading model; image sources fail without it
    #[arg(long, env = "VISION_API_KEY", hide_env_values = true)]
    vision_api_key: Option<String>,

    #[arg(long, env = "VISION_MODEL", default_value = covid_client::vision::DEFAULT_MODEL)]
    vision_model: String,

    #[arg(long, env = "VISION_BASE_URL", default_value = "https://api.openai.com/v1")]
    vision_base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("covid=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            live,
            discord,
            sources,
            settings,
        } => {
            let fetcher_kind = if live {
                FetcherKind::Http
            } else {
                FetcherKind::Fixture
            };
            let selectors = Selector::parse_list(&sources, fetcher_kind)?;

            let publisher: Box<dyn Publisher> = if discord {
                let config = DiscordConfig::from_env()?;
                Box::new(DiscordPublisher::new(&config)?)
            } else {
                Box::new(WritePublisher::stdout())
            };

            cmd_run(&settings, selectors, vec![publisher]).await?;
        }
        Commands::Event {
            payload,
            sources,
            settings,
        } => {
            let event = EventPayload::read(&payload)?;
            let selectors = event.selectors(&sources)?;
            let discord = DiscordPublisher::new(&event.discord_config()?)
                .context("Discord is not configured for managed-event mode")?;

            cmd_run(&settings, selectors, vec![Box::new(discord)]).await?;
        }
        Commands::Sources => {
            let factory = ScraperFactory::new("fixtures");
            for selector in factory.supported() {
                println!("{selector}");
            }
        }
    }

    Ok(())
}

fn build_factory(settings: &Settings) -> Result<ScraperFactory> {
    let transport = ReqwestTransport::new().context("Failed to create HTTP client")?;
    let factory = ScraperFactory::new(&settings.fixtures).with_transport(Arc::new(transport));

    // A blank key (e.g. `VISION_API_KEY=` in .env) counts as unset.
    let key = settings
        .vision_api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    match key {
        Some(key) => {
            let reader = OpenAiChartReader::with_base_url(
                key,
                &settings.vision_model,
                &settings.vision_base_url,
            )?
            .with_timeout(Duration::from_secs(settings.timeout_secs))?;
            Ok(factory.with_interpreter(Arc::new(reader)))
        }
        None => {
            tracing::debug!("No vision API key; image sources will fail");
            Ok(factory)
        }
    }
}

async fn cmd_run(
    settings: &Settings,
    sources: Vec<Selector>,
    publishers: Vec<Box<dyn Publisher>>,
) -> Result<()> {
    let offline = sources
        .iter()
        .any(|s| s.fetcher_kind == FetcherKind::Fixture);
    if offline && !is_fixture_root(&settings.fixtures) {
        tracing::warn!(
            dir = %settings.fixtures.display(),
            "Fixture directory has no country folders; offline sources will fail"
        );
    }

    let factory = build_factory(settings)?;
    let renderer = TemplateRenderer::from_dir(&settings.templates)
        .with_context(|| format!("Failed to load templates from {}", settings.templates.display()))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let ctx = RunContext::with_token(cancel, Duration::from_secs(settings.timeout_secs));
    let config = DailyUpdateConfig {
        sources,
        failure_policy: settings.failure_policy,
    };

    let report = daily_update(&ctx, &factory, &renderer, &publishers, &config).await?;

    for failure in &report.failures {
        tracing::warn!(
            selector = %failure.selector,
            error = %failure.error,
            "Source skipped"
        );
    }
    tracing::info!(
        run_id = %ctx.run_id,
        summaries = report.summaries.len(),
        delivered = report.delivered,
        "Update complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_settings(args: &[&str]) -> Settings {
        let mut argv = vec!["covid-bot", "run"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run { settings, .. } => settings,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_blank_vision_key_falls_back_to_unconfigured() {
        for key in ["", "   "] {
            let settings = run_settings(&["--vision-api-key", key]);
            assert_eq!(settings.vision_api_key.as_deref(), Some(key));
            assert!(build_factory(&settings).is_ok(), "{key:?}");
        }
    }

    #[test]
    fn test_vision_key_builds_reader() {
        let settings = run_settings(&["--vision-api-key", "sk-test", "--timeout-secs", "60"]);
        assert!(build_factory(&settings).is_ok());
    }

    #[test]
    fn test_failure_policy_flag() {
        let settings = run_settings(&["--failure-policy", "skip"]);
        assert_eq!(settings.failure_policy, FailurePolicy::Skip);
        assert!(Cli::try_parse_from(["covid-bot", "run", "--failure-policy", "retry"]).is_err());
    }
}
