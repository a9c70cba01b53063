//! Infrastructure Site Selector CLI
//!
//! Usage:
//!   site-selector evaluate --lat 46.8 --lng 75.0
//!   site-selector zones --geojson zones.geojson
//!   site-selector dataset cities
//!   site-selector cache status
//!   site-selector cache clear --data-type water_sources
//!   site-selector history --limit 10
//!   site-selector export 3
//!   site-selector weights --set seismic_safety=0.2 --set public_acceptance=0.1
//!
//! JSON results go to stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geo_kernel::GeoPoint;
use serde::Serialize;
use site_selector::store::DEFAULT_HISTORY_LIMIT;
use site_selector::{DataType, SelectorConfig, SiteSelector};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "site-selector",
    about = "Score candidate sites for critical infrastructure"
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Skip the remote acquisition tier
    #[arg(long)]
    offline: bool,

    /// Seed for synthesized exclusion-zone boundaries
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a site and record the evaluation
    Evaluate {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
    /// List exclusion zones
    Zones {
        /// Write the zones as a GeoJSON FeatureCollection instead
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
    /// Resolve a reference layer and print it as GeoJSON
    Dataset {
        /// cities, water_sources, seismic_zones or transportation
        data_type: DataType,
    },
    /// Inspect or clear the reference-data cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Recent evaluations, newest first
    History {
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Print a stored evaluation
    Export { id: u64 },
    /// Show criteria weights, optionally updating some first
    Weights {
        /// criterion=weight, repeatable
        #[arg(long = "set", value_parser = parse_weight)]
        set: Vec<(String, f64)>,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    Status,
    Clear {
        /// Clear one layer only
        #[arg(long)]
        data_type: Option<DataType>,
    },
}

fn parse_weight(raw: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected criterion=weight, got '{raw}'"))?;
    let weight = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight '{value}': {e}"))?;
    Ok((key.trim().to_string(), weight))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_directive = if args.verbose {
        "site_selector=debug,geo_kernel=debug"
    } else {
        "site_selector=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = SelectorConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.cache_dir {
        config.cache.dir = dir;
    }
    if args.offline {
        config.remote.enabled = false;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let mut selector = SiteSelector::from_config(config).context("failed to initialize site selector")?;

    match args.command {
        Command::Evaluate { lat, lng } => {
            let evaluation = selector.evaluate(GeoPoint::new(lat, lng))?;
            print_json(&evaluation)?;
        }
        Command::Zones { geojson: Some(path) } => {
            info!("Writing exclusion zones to {:?}", path);
            let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &selector.exclusion_zones_geojson())?;
        }
        Command::Zones { geojson: None } => {
            print_json(&selector.list_exclusion_zones())?;
        }
        Command::Dataset { data_type } => {
            let dataset = selector.load_dataset(data_type)?;
            info!("{}: {} records", data_type, dataset.len());
            print_json(&dataset.to_feature_collection())?;
        }
        Command::Cache { action: CacheAction::Status } => {
            print_json(&selector.cache_status())?;
        }
        Command::Cache {
            action: CacheAction::Clear { data_type },
        } => {
            let removed = selector.clear_cache(data_type)?;
            info!("Removed {} cache files", removed);
        }
        Command::History { limit } => {
            print_json(&selector.historical_evaluations(limit)?)?;
        }
        Command::Export { id } => {
            print_json(&selector.export_evaluation(id)?)?;
        }
        Command::Weights { set } => {
            if !set.is_empty() {
                let partial: BTreeMap<String, f64> = set.into_iter().collect();
                let applied = selector.update_weights(&partial)?;
                let keys: Vec<&str> = applied.iter().map(|c| c.key()).collect();
                info!("Applied weights: {}", keys.join(", "));
            }
            print_json(&selector.weights()?)?;
        }
    }

    Ok(())
}
