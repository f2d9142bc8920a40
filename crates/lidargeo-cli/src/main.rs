//! Command-line interface for `lidargeo`, turning USGS lidar into terrain layers.
//!
//! This binary provides a thin CLI over the [`lidargeo_core`] library: it finds the
//! Entwine Point Tile partitions covering a bounding box, runs the PDAL pipeline for
//! each, and derives elevation and topographic wetness index (TWI) layers.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! It parses arguments, configures logging, and delegates to command handlers. PDAL and the
//! GDAL command-line tools must be installed for `fetch`.
//!
//! # Available Commands
//!
//! - `regions` - List the partitions whose extent contains a bounding box
//! - `fetch` - Produce elevation and TWI layers for a bounding box
//! - `info` - Display the metadata and schema of one partition
//!
//! # Example
//!
//! ```text
//! lidargeo -v fetch --bounds "([-10425171.94, -10423171.94], [5164494.71, 5166494.71])" \
//!     --crs 26915 --work-dir out --geojson
//! ```

mod display;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, debug, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use lidargeo_core::operations;
use lidargeo_core::{ArchiveConfig, BoundingBox, FetchFailurePolicy, LidarGeoError, RunOptions};

#[derive(Parser)]
#[command(
    name = "lidargeo",
    version,
    about = "Elevation and wetness layers from USGS 3DEP lidar",
    long_about = "lidargeo finds the USGS Entwine Point Tile partitions covering a bounding box,\n\
                  runs a PDAL pipeline for each, and derives elevation and topographic wetness\n\
                  index (TWI) layers."
)]
/// Command-line arguments and options for the `lidargeo` CLI.
///
/// This struct defines the top-level CLI interface, including global flags for
/// logging verbosity and the subcommand to execute.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options controlling how the archive metadata is indexed.
#[derive(Args, Debug, Clone)]
struct ArchiveArgs {
    /// Maximum number of metadata documents fetched at once.
    #[arg(long, value_name = "N", default_value_t = 64)]
    fetch_concurrency: usize,

    /// Per-request timeout for metadata documents, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    fetch_timeout_secs: u64,

    /// Drop partitions whose metadata cannot be reached instead of failing.
    #[arg(long)]
    skip_unreachable: bool,
}

impl ArchiveArgs {
    fn archive_config(&self) -> ArchiveConfig {
        let policy = if self.skip_unreachable {
            FetchFailurePolicy::Skip
        } else {
            FetchFailurePolicy::Abort
        };
        ArchiveConfig::default()
            .with_fetch_concurrency(self.fetch_concurrency)
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_failure_policy(policy)
    }
}

/// Available subcommands for the `lidargeo` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Lists the partitions whose extent contains a bounding box.
    Regions {
        /// Bounding box as "([minx, maxx], [miny, maxy])" in EPSG:3857.
        #[arg(short, long, value_name = "BOUNDS", allow_hyphen_values = true)]
        bounds: String,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Produces elevation and TWI layers for every partition covering a bounding box.
    ///
    /// Each region runs a PDAL pipeline (read, drop noise, reproject, write LAS and
    /// GeoTIFF), then the raster is polygonized and TWI computed per cell.
    Fetch {
        /// Bounding box as "([minx, maxx], [miny, maxy])" in EPSG:3857.
        #[arg(short, long, value_name = "BOUNDS", allow_hyphen_values = true)]
        bounds: String,

        /// Output EPSG code for the reprojected points and layers.
        #[arg(long, value_name = "EPSG")]
        crs: u32,

        /// Raster cell size in output CRS units.
        #[arg(short, long, default_value_t = 5.0)]
        resolution: f64,

        /// Directory for LAS, GeoTIFF, and exported files.
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        work_dir: PathBuf,

        /// Number of regions processed at once.
        #[arg(long, value_name = "N", default_value_t = 1)]
        concurrency: usize,

        /// Render a PNG scatter plot of elevation per region.
        #[arg(long)]
        save_png: bool,

        /// Write each layer to `<region>.geojson`.
        #[arg(long)]
        geojson: bool,

        /// Write each layer to `<region>.csv`.
        #[arg(long)]
        csv: bool,

        /// Fail a region whose TWI contains NaN or infinite values.
        #[arg(long)]
        strict_twi: bool,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Displays the metadata and schema of one partition.
    Info {
        /// Partition identifier, e.g. `USGS_LPC_IA_FullState_2019/`.
        #[arg(long, value_name = "REGION")]
        region: String,

        #[command(flatten)]
        archive: ArchiveArgs,
    },
}

/// Entry point for the `lidargeo` command-line interface.
///
/// This function parses command-line arguments, configures the logging system based on
/// verbosity flags, and dispatches to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if command execution fails or if the logging system cannot be initialized.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Regions { bounds, archive } => {
            info!("Resolving regions for {bounds}");
            handle_regions(&bounds, &archive).await?;
        },
        Commands::Fetch {
            bounds,
            crs,
            resolution,
            work_dir,
            concurrency,
            save_png,
            geojson,
            csv,
            strict_twi,
            archive,
        } => {
            info!("Fetching layers for {bounds} in EPSG:{crs}");
            let run = RunOptions::new()
                .with_resolution(resolution)
                .with_work_dir(work_dir)
                .with_concurrency(concurrency)
                .with_save_png(save_png)
                .with_geojson_export(geojson)
                .with_csv_export(csv)
                .with_strict_twi(strict_twi);
            handle_fetch(&bounds, crs, &archive, &run).await?;
        },
        Commands::Info { region, archive } => {
            info!("Displaying info for {region}");
            handle_info(&region, &archive).await?;
        },
    }

    Ok(())
}

/// Converts a library error into a CLI error carrying the recovery hint, if any.
fn report(err: LidarGeoError) -> anyhow::Error {
    match err.recovery_suggestion() {
        Some(hint) => anyhow!("{}\nHint: {hint}", err.user_message()),
        None => anyhow!("{}", err.user_message()),
    }
}

fn parse_bounds(bounds: &str) -> Result<BoundingBox> {
    bounds
        .parse::<BoundingBox>()
        .map_err(|e| report(LidarGeoError::from(e)))
}

async fn handle_regions(bounds: &str, archive: &ArchiveArgs) -> Result<()> {
    let bounds = parse_bounds(bounds)?;
    debug!("Parsed bounds: {bounds}");

    let partitions = operations::resolve_regions(&bounds, &archive.archive_config())
        .await
        .map_err(report)?;
    display::display_regions(&partitions);
    Ok(())
}

async fn handle_fetch(bounds: &str, crs: u32, archive: &ArchiveArgs, run: &RunOptions) -> Result<()> {
    let bounds = parse_bounds(bounds)?;
    run.validate().map_err(|e| report(e.into()))?;
    debug!("Parsed bounds: {bounds}");
    debug!("Run options: {run:?}");

    let results = operations::fetch_layers(&bounds, crs, &archive.archive_config(), run)
        .await
        .map_err(report)?;
    display::display_results(&results);
    info!("Fetch complete.");
    Ok(())
}

async fn handle_info(region: &str, archive: &ArchiveArgs) -> Result<()> {
    let partition = operations::describe_region(region, &archive.archive_config())
        .await
        .map_err(report)?;
    display::display_partition(&partition);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_args_build_config() {
        let args = ArchiveArgs {
            fetch_concurrency: 8,
            fetch_timeout_secs: 5,
            skip_unreachable: true,
        };
        let config = args.archive_config();
        assert_eq!(config.fetch_concurrency, 8);
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.failure_policy, FetchFailurePolicy::Skip);
    }

    #[test]
    fn test_fetch_defaults() {
        let cli = Cli::try_parse_from([
            "lidargeo",
            "fetch",
            "--bounds",
            "([-10425171.94, -10423171.94], [5164494.71, 5166494.71])",
            "--crs",
            "26915",
        ])
        .unwrap();

        let Commands::Fetch {
            resolution,
            concurrency,
            work_dir,
            archive,
            ..
        } = cli.command
        else {
            panic!("expected fetch command");
        };
        assert!((resolution - 5.0).abs() < f64::EPSILON);
        assert_eq!(concurrency, 1);
        assert_eq!(work_dir, PathBuf::from("."));
        assert_eq!(archive.archive_config().failure_policy, FetchFailurePolicy::Abort);
    }

    #[test]
    fn test_parse_bounds_error_has_hint() {
        let err = parse_bounds("([1, 2], [3])").unwrap_err().to_string();
        assert!(err.contains("Invalid bounds"));
        assert!(err.contains("Hint:"));
    }

    #[tokio::test]
    async fn test_handle_fetch_rejects_bounds_before_indexing() {
        let archive = ArchiveArgs {
            fetch_concurrency: 1,
            fetch_timeout_secs: 1,
            skip_unreachable: false,
        };
        let result = handle_fetch("([5, 1], [0, 1])", 3857, &archive, &RunOptions::new()).await;
        assert!(result.unwrap_err().to_string().contains("minimum exceeds maximum"));
    }

    #[tokio::test]
    async fn test_handle_fetch_rejects_zero_resolution() {
        let archive = ArchiveArgs {
            fetch_concurrency: 1,
            fetch_timeout_secs: 1,
            skip_unreachable: false,
        };
        let run = RunOptions::new().with_resolution(0.0);
        let result = handle_fetch("([0, 1], [0, 1])", 3857, &archive, &run).await;
        assert!(result.unwrap_err().to_string().contains("resolution"));
    }
}
