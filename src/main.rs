use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use heatmap_geocoder::{init_tracing, load_csv, AppConfig, ResolutionPipeline};

/// Geocode a vehicle concentration CSV into a GeoJSON feature collection.
#[derive(Parser, Debug)]
#[command(name = "heatmap-geocoder")]
#[command(version)]
struct Args {
    /// CSV with City, State, Concentration_Type and Vehicle_Count columns
    input: PathBuf,

    /// Where to write the feature collection (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overrides GEOCODE_CACHE_PATH
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Overrides SAMPLE_SEED
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(cache) = args.cache {
        config.cache_path = cache;
    }
    if let Some(seed) = args.seed {
        config.sample_seed = Some(seed);
    }

    let records = load_csv(&args.input)
        .with_context(|| format!("failed to load records from {}", args.input.display()))?;
    let pipeline =
        ResolutionPipeline::from_config(&config).context("failed to build resolution pipeline")?;

    let collection = pipeline.run(&records).await;
    let rendered = serde_json::to_string_pretty(&collection)?;

    match args.output {
        Some(path) => {
            fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                path = %path.display(),
                features = collection.features.len(),
                "feature collection written"
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
