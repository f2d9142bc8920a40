//! Runs the pipeline across several regions with per-region failure isolation.
//!
//! A region whose pipeline, conversion, or derivation fails is logged and skipped;
//! the remaining regions still produce layers. Only failures that concern the run as
//! a whole (such as an unusable work directory) abort it.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use layer_shared::VectorLayer;
use lidargeo_core_common::PipelineExecutor;
use log::{info, warn};

use crate::config::{ArchiveConfig, RunOptions};
use crate::error::{IoErrorExt, LidarGeoError, PipelineError, Result};
use crate::pipeline::{BindParams, PipelineSettings, PipelineTemplate};
use crate::terrain::{DataQuality, DeriveOptions, DerivedLayer, TerrainDeriver};
use crate::types::BoundingBox;
use crate::utils::{region_label, region_stem};

/// A region that produced no layer, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    pub region: String,
    pub reason: String,
    /// The region simply had no points inside the bounds.
    pub no_data: bool,
}

/// One labelled layer of a [`ResultSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegionLayer {
    /// Partition id the layer was derived from.
    pub region: String,
    pub layer: VectorLayer,
    pub quality: DataQuality,
}

/// Derived layers keyed by label, plus the regions that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: BTreeMap<String, RegionLayer>,
    pub skipped: Vec<RegionFailure>,
}

impl ResultSet {
    /// Inserts a region's layer under its label and returns the label used.
    ///
    /// When the label is taken by an earlier region, the layer is stored under its full
    /// region id instead and a warning is logged.
    pub fn insert(&mut self, region: &str, derived: DerivedLayer) -> String {
        let mut label = region_label(region);
        if let Some(existing) = self.entries.get(&label) {
            warn!(
                "Label '{label}' is already used by {}; storing {region} under its full id",
                existing.region
            );
            label = region.to_string();
        }
        self.entries.insert(
            label.clone(),
            RegionLayer {
                region: region.to_string(),
                layer: derived.layer,
                quality: derived.quality,
            },
        );
        label
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&VectorLayer> {
        self.entries.get(label).map(|entry| &entry.layer)
    }

    #[must_use]
    pub fn entry(&self, label: &str) -> Option<&RegionLayer> {
        self.entries.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegionLayer)> {
        self.entries.iter().map(|(label, entry)| (label.as_str(), entry))
    }

    /// Consumes the set, keeping only the layers.
    #[must_use]
    pub fn into_layers(self) -> BTreeMap<String, VectorLayer> {
        self.entries
            .into_iter()
            .map(|(label, entry)| (label, entry.layer))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drives bind, execute, and derive for every region of a request.
#[derive(Clone)]
pub struct Orchestrator {
    executor: Arc<dyn PipelineExecutor>,
    deriver: TerrainDeriver,
    archive: ArchiveConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("archive", &self.archive)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        executor: Arc<dyn PipelineExecutor>,
        deriver: TerrainDeriver,
        archive: ArchiveConfig,
    ) -> Self {
        Self {
            executor,
            deriver,
            archive,
        }
    }

    /// Processes `regions` and collects their layers.
    ///
    /// Regions run in input order, `options.concurrency` at a time. With the default of
    /// one they run strictly one after another.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid options or a work directory that cannot be
    /// created. Per-region failures are reported in [`ResultSet::skipped`].
    pub async fn run(
        &self,
        regions: &[String],
        bounds: &BoundingBox,
        crs: u32,
        options: &RunOptions,
    ) -> Result<ResultSet> {
        options.validate()?;
        let mut results = ResultSet::default();
        if regions.is_empty() {
            info!("No regions to process");
            return Ok(results);
        }

        tokio::fs::create_dir_all(&options.work_dir)
            .await
            .with_write_context("directory", &options.work_dir)?;

        let template =
            PipelineTemplate::new(&PipelineSettings::default().with_resolution(options.resolution));

        let mut outcomes = stream::iter(regions)
            .map(|region| {
                let template = &template;
                async move {
                    let outcome = self.process(template, region, bounds, crs, options).await;
                    (region, outcome)
                }
            })
            .buffered(options.concurrency);

        while let Some((region, outcome)) = outcomes.next().await {
            match outcome {
                Ok(derived) => {
                    let features = derived.layer.len();
                    let label = results.insert(region, derived);
                    info!("Region {region} stored as '{label}' with {features} feature(s)");
                },
                Err(err) if err.is_region_local() => {
                    warn!("Skipping region {region}: {err}");
                    let no_data = matches!(
                        &err,
                        LidarGeoError::Pipeline(PipelineError::Execution(e)) if e.is_no_data()
                    );
                    results.skipped.push(RegionFailure {
                        region: region.clone(),
                        reason: err.to_string(),
                        no_data,
                    });
                    if regions.len() > 1 {
                        info!("Continuing with the next region");
                    }
                },
                Err(err) => return Err(err),
            }
        }

        info!(
            "Processed {} region(s): {} layer(s), {} skipped",
            regions.len(),
            results.len(),
            results.skipped.len()
        );
        Ok(results)
    }

    async fn process(
        &self,
        template: &PipelineTemplate,
        region: &str,
        bounds: &BoundingBox,
        crs: u32,
        options: &RunOptions,
    ) -> Result<DerivedLayer> {
        info!("Fetching points and raster for {region}");
        let source_url = self.archive.metadata_url(region);
        let job = template.bind(&BindParams {
            region,
            bounds,
            crs,
            source_url: &source_url,
            work_dir: &options.work_dir,
        })?;

        let artifacts = self.executor.execute(&job).await?;

        let mut derive_options =
            DeriveOptions::new(options.resolution).with_strict(options.strict_twi);
        if options.save_png {
            derive_options = derive_options
                .with_png(options.work_dir.join(format!("{}.png", region_stem(region))));
        }

        let mut derived = self
            .deriver
            .derive(region, &artifacts.raster_path, &derive_options)
            .await?;
        derived.layer.crs = Some(format!("EPSG:{crs}"));
        Ok(derived)
    }
}
