use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;

use content_batch::batch::{plan, BatchParams, GenerationDefaults};
use content_batch::config;
use content_batch::{ContentPillar, ContentType, GenerationStrategy, TimeframeKind, WeekStart};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Print the jobs a batch would run without calling the generator"
)]
struct Args {
    /// Optional YAML config; supplies week start and length/tone defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "week")]
    timeframe: TimeframeKind,

    /// Anchor date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long, default_value = "idea")]
    content_type: ContentType,

    #[arg(long, default_value = "thesis")]
    strategy: GenerationStrategy,

    #[arg(long)]
    pillar: Option<ContentPillar>,

    /// Print each job as a JSON line
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (week_start, defaults) = match &args.config {
        Some(path) => {
            let cfg = config::load(Some(path))?;
            (cfg.app.week_start, GenerationDefaults::from(&cfg.defaults))
        }
        None => (WeekStart::default(), GenerationDefaults::default()),
    };

    let anchor = args.date.unwrap_or_else(|| Local::now().date_naive());
    let params = BatchParams::new(args.timeframe, anchor, args.content_type, args.strategy)
        .with_pillar(args.pillar);
    let jobs = plan(&params, week_start, &defaults);

    println!(
        "{} job(s) for {} {} ({} / {})",
        jobs.len(),
        params.timeframe.as_str(),
        anchor,
        params.strategy.as_str(),
        params.content_type
    );
    for job in &jobs {
        if args.json {
            let line = serde_json::json!({
                "index": job.sequence_index,
                "date": job.date.format("%Y-%m-%d").to_string(),
                "pillar": job.pillar.map(|p| p.label()),
                "color": job.color(),
                "focus": job.request.focus,
                "style": job.request.style,
                "length": job.request.length,
                "tone": job.request.tone,
                "include_timing": job.request.include_timing,
            });
            println!("{}", line);
        } else {
            println!(
                "#{:<2} {} {:<9} {} {}",
                job.sequence_index + 1,
                job.date.format("%a %Y-%m-%d"),
                job.pillar.map(|p| p.label()).unwrap_or("-"),
                job.color(),
                job.request.focus
            );
        }
    }
    Ok(())
}
