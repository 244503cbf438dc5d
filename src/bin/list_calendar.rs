use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use content_batch::config;
use content_batch::db;

#[derive(Debug, Parser)]
#[command(author, version, about = "List calendar entries in a date range")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// First day (inclusive)
    #[arg(long)]
    from: NaiveDate,

    /// Last day (inclusive); defaults to `from`
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Only entries created by this batch run
    #[arg(long)]
    batch: Option<String>,

    /// Include notes under each entry
    #[arg(long)]
    notes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let to = args.to.unwrap_or(args.from);
    if to < args.from {
        bail!("--to {} is before --from {}", to, args.from);
    }

    let cfg = config::load(Some(&args.config))?;
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let entries = db::list_entries_between(&pool, args.from, to).await?;
    let entries: Vec<_> = match &args.batch {
        Some(batch) => entries
            .into_iter()
            .filter(|e| e.batch_id.as_deref() == Some(batch.as_str()))
            .collect(),
        None => entries,
    };

    for entry in &entries {
        println!(
            "{} [{}] {} {} (#{}{})",
            entry.date,
            entry.content_type_tag,
            entry.color_hex,
            entry.title,
            entry.id,
            entry
                .batch_id
                .as_deref()
                .map(|b| format!(", batch {}", b))
                .unwrap_or_default()
        );
        if args.notes && !entry.notes.is_empty() {
            for line in entry.notes.lines() {
                println!("    {}", line);
            }
        }
    }
    println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    Ok(())
}
