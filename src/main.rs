use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use content_batch::batch::{BatchParams, BatchRunner};
use content_batch::config;
use content_batch::db::{self, SqliteCalendar};
use content_batch::generator::{Credentials, HttpGenerator};
use content_batch::progress::log_progress;
use content_batch::throttle::FixedDelay;
use content_batch::{ContentPillar, ContentType, GenerationStrategy, TimeframeKind};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Generate a batch of content ideas into the calendar"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// single, week or month
    #[arg(long, default_value = "single")]
    timeframe: TimeframeKind,

    /// Anchor date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// idea, key_points or full_script
    #[arg(long, default_value = "idea")]
    content_type: ContentType,

    /// random or thesis
    #[arg(long, default_value = "random")]
    strategy: GenerationStrategy,

    /// Fixed pillar for the thesis strategy; rotates through all pillars when omitted
    #[arg(long)]
    pillar: Option<ContentPillar>,

    /// Generator API key for this run (overrides generator.api_key)
    #[arg(long, env = "GENERATOR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    if args.pillar.is_some() && args.strategy != GenerationStrategy::Thesis {
        warn!("--pillar only applies to the thesis strategy; ignoring it");
    }

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current job");
            ctrl_c.cancel();
        }
    });

    let runner = BatchRunner::new(
        Arc::new(HttpGenerator::from_config(&cfg)?),
        Arc::new(SqliteCalendar::new(pool)),
    )
    .with_throttle(Arc::new(FixedDelay::from_millis(cfg.app.throttle_ms)))
    .with_defaults((&cfg.defaults).into())
    .with_week_start(cfg.app.week_start)
    .with_cancellation(cancel);

    let anchor = args.date.unwrap_or_else(|| Local::now().date_naive());
    let params = BatchParams::new(args.timeframe, anchor, args.content_type, args.strategy)
        .with_pillar(args.pillar)
        .with_credentials(Credentials {
            api_key: args.api_key,
            model: None,
        });

    let report = runner.run_report(&params, log_progress).await;
    info!(
        run_id = %report.run_id,
        saved = report.entries.len(),
        "batch finished"
    );

    if !report.succeeded() {
        let reason = report
            .terminal
            .as_ref()
            .and_then(|p| p.error.clone().or_else(|| p.message.clone()))
            .unwrap_or_else(|| "unknown".into());
        error!(%reason, "batch did not complete");
        bail!("batch did not complete: {}", reason);
    }
    Ok(())
}
