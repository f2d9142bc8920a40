//! Top-level operations for resolving regions and fetching terrain layers.
//!
//! These functions wire the archive store, metadata index, pipeline executor and
//! polygonizer together. They are what the CLI calls; library users who need their
//! own engines can assemble an [`Orchestrator`] directly and use [`fetch_layers_with`].

use std::path::PathBuf;
use std::sync::Arc;

use layer_csv::{CsvWriterOptions, write_csv_file};
use layer_geojson::{GeoJsonWriterOptions, write_geojson_file};
use log::info;

use crate::config::{ArchiveConfig, RunOptions};
use crate::error::{IoErrorExt, Result};
use crate::executor::{GdalPolygonizer, PdalExecutor};
use crate::metadata::MetadataIndex;
use crate::orchestrator::{Orchestrator, ResultSet};
use crate::region::resolve;
use crate::terrain::TerrainDeriver;
use crate::types::{BoundingBox, PartitionDescriptor};
use crate::utils::region_stem;

/// Lists the archive and indexes every partition's metadata.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the store cannot be built, or the
/// index build aborts.
pub async fn load_index(archive: &ArchiveConfig) -> Result<MetadataIndex> {
    archive.validate()?;
    let store = archive.object_store()?;
    info!("Indexing archive bucket '{}'", archive.bucket);
    Ok(MetadataIndex::build(store.as_ref(), archive).await?)
}

/// Returns the descriptors of all partitions whose extent contains `bounds`.
///
/// # Errors
///
/// Returns an error if the archive index cannot be built.
pub async fn resolve_regions(
    bounds: &BoundingBox,
    archive: &ArchiveConfig,
) -> Result<Vec<PartitionDescriptor>> {
    let index = load_index(archive).await?;
    Ok(resolve(&index, bounds)
        .iter()
        .filter_map(|id| index.get(id).cloned())
        .collect())
}

/// Returns the descriptor of a single partition.
///
/// # Errors
///
/// Returns an error if the index cannot be built or the partition is unknown.
pub async fn describe_region(region: &str, archive: &ArchiveConfig) -> Result<PartitionDescriptor> {
    let index = load_index(archive).await?;
    Ok(index.descriptor(region)?.clone())
}

/// Resolves the regions for `bounds`, runs the pipeline for each with PDAL and GDAL,
/// and writes the requested exports.
///
/// # Errors
///
/// Returns an error if indexing aborts, the options are invalid, or an export cannot
/// be written. Regions that fail individually are listed in [`ResultSet::skipped`].
pub async fn fetch_layers(
    bounds: &BoundingBox,
    crs: u32,
    archive: &ArchiveConfig,
    run: &RunOptions,
) -> Result<ResultSet> {
    run.validate()?;
    let index = load_index(archive).await?;
    let orchestrator = Orchestrator::new(
        Arc::new(PdalExecutor::new()),
        TerrainDeriver::new(Arc::new(GdalPolygonizer::new())),
        archive.clone(),
    );
    fetch_layers_with(&index, &orchestrator, bounds, crs, run).await
}

/// Like [`fetch_layers`], with a prepared index and orchestrator.
///
/// # Errors
///
/// Returns an error if the options are invalid or an export cannot be written.
pub async fn fetch_layers_with(
    index: &MetadataIndex,
    orchestrator: &Orchestrator,
    bounds: &BoundingBox,
    crs: u32,
    run: &RunOptions,
) -> Result<ResultSet> {
    let regions = resolve(index, bounds);
    let results = orchestrator.run(&regions, bounds, crs, run).await?;
    write_exports(&results, run)?;
    Ok(results)
}

/// Writes `<stem>.geojson` and/or `<stem>.csv` for every layer, as enabled in `run`.
///
/// Returns the paths written.
///
/// # Errors
///
/// Returns [`crate::error::IoError::Write`] for the first file that cannot be written.
pub fn write_exports(results: &ResultSet, run: &RunOptions) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (_, entry) in results.iter() {
        let stem = region_stem(&entry.region);

        if run.export_geojson {
            let path = run.work_dir.join(format!("{stem}.geojson"));
            write_geojson_file(&path, &entry.layer, &GeoJsonWriterOptions::default())
                .with_write_context("GeoJSON", &path)?;
            info!("Saved {} feature(s) to {}", entry.layer.len(), path.display());
            written.push(path);
        }

        if run.export_csv {
            let path = run.work_dir.join(format!("{stem}.csv"));
            write_csv_file(&path, &entry.layer, &CsvWriterOptions::default())
                .with_write_context("CSV", &path)?;
            info!("Saved {} feature(s) to {}", entry.layer.len(), path.display());
            written.push(path);
        }
    }
    Ok(written)
}
