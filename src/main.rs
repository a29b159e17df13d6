use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use deal_sniper::catalog_export::export_generation_catalog_json;
use deal_sniper::config::{PricingMode, Settings, load_settings};
use deal_sniper::pipeline::{self, RunOutput};
use deal_sniper::source::{CsvSource, ListingSource, SnapshotSource};
use deal_sniper::storage::SqliteStorage;
use deal_sniper::storage::csv::write_rows;
use deal_sniper::utils::timestamp_run_id;

#[derive(Debug, Parser)]
#[command(name = "deal-sniper")]
#[command(about = "Value, deduplicate and rank scraped vehicle listings")]
struct Cli {
    /// JSON configuration; defaults apply when the file does not exist
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Rank one batch of scraped listings
    #[command(group(ArgGroup::new("listings").required(true).args(["input", "snapshots"])))]
    Rank {
        /// Scraper output CSV
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory of saved listing pages
        #[arg(long)]
        snapshots: Option<PathBuf>,
        /// msrp_only or current; overrides the config file
        #[arg(long)]
        mode: Option<PricingMode>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Skip the SQLite output table
        #[arg(long)]
        no_sqlite: bool,
    },
    /// Export the generation catalog as JSON
    Catalog {
        #[arg(long, default_value = "data/generation_catalog.json")]
        out: PathBuf,
    },
    /// List the active options catalog
    Options,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic occurred: {panic_info}");
    }));

    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config)
        .with_context(|| format!("refusing to run with config {}", cli.config.display()))?;
    info!("Loaded {} catalog options", settings.catalog.len());

    match cli.command {
        Commands::Rank {
            input,
            snapshots,
            mode,
            output_dir,
            no_sqlite,
        } => {
            if let Some(mode) = mode {
                settings.config.pricing_mode = mode;
            }
            if let Some(dir) = output_dir {
                settings.config.output.directory = dir;
            }
            if no_sqlite {
                settings.config.output.sqlite_path = None;
            }

            let source: Box<dyn ListingSource> = match (input, snapshots) {
                (Some(path), _) => Box::new(CsvSource::new(path)),
                (None, Some(dir)) => {
                    Box::new(SnapshotSource::new(dir, settings.vehicles.clone()))
                }
                (None, None) => anyhow::bail!("either --input or --snapshots is required"),
            };
            rank(&settings, source.as_ref()).await?;
        }
        Commands::Catalog { out } => {
            export_generation_catalog_json(&settings, &out)?;
        }
        Commands::Options => print_options(&settings),
    }

    Ok(())
}

async fn rank(settings: &Settings, source: &dyn ListingSource) -> anyhow::Result<()> {
    info!("Loading listings from {}", source.describe());
    let raws = source
        .load()
        .await
        .with_context(|| format!("failed to load {}", source.describe()))?;

    let run_id = timestamp_run_id();
    let output = pipeline::run(settings, raws, &run_id);
    write_outputs(settings, &output)?;

    info!(
        "Done: {} ranked, {} duplicates dropped, {} failed rows",
        output.stats.ranked, output.stats.duplicates, output.stats.failed
    );
    Ok(())
}

fn write_outputs(settings: &Settings, output: &RunOutput) -> anyhow::Result<()> {
    let dir = &settings.config.output.directory;
    let ranking_path = dir.join(format!("ranking_{}.csv", output.run_id));
    write_rows(&ranking_path, &output.ranked)?;
    info!("Wrote {}", ranking_path.display());

    if !output.failed.is_empty() {
        let failed_path = dir.join(format!("failed_{}.csv", output.run_id));
        write_rows(&failed_path, &output.failed)?;
        warn!("{} failed rows written to {}", output.failed.len(), failed_path.display());
    }

    if let Some(db_path) = settings.config.output.sqlite_path.as_deref() {
        write_sqlite(db_path, output)?;
    }
    Ok(())
}

fn write_sqlite(db_path: &Path, output: &RunOutput) -> anyhow::Result<()> {
    let mut storage = SqliteStorage::new(db_path)?;
    storage.replace_ranking(&output.run_id, &output.ranked)?;
    storage.record_failed(&output.run_id, &output.failed)?;
    info!(
        "Updated SQLite tables in {}: {} ranked rows, {} failed rows for this run",
        db_path.display(),
        storage.load_ranking()?.len(),
        storage.failed_count(&output.run_id)?
    );
    Ok(())
}

fn print_options(settings: &Settings) {
    println!(
        "{:<16} {:<44} {:>7} {:>7}  {:<12} standard on",
        "id", "display", "value", "msrp", "category"
    );
    for d in settings.catalog.definitions() {
        let msrp = d.msrp_usd.map(|m| m.to_string()).unwrap_or_default();
        println!(
            "{:<16} {:<44} {:>7} {:>7}  {:<12} {}",
            d.id,
            d.display,
            d.value_usd,
            msrp,
            d.category.to_string(),
            d.standard_on.join(", ")
        );
    }
}
