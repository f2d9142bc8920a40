//! Process-backed implementations of the engine boundary traits.
//!
//! [`PdalExecutor`] runs `pdal pipeline --stdin` and [`GdalPolygonizer`] runs
//! `gdal_polygonize.py` followed by `ogr2ogr`. Both run each job as a separate OS
//! process, so concurrent regions never share engine state.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use layer_geojson::parse_geojson_bytes;
use layer_shared::VectorLayer;
use lidargeo_core_common::{
    BoundPipeline, ExecutionError, PipelineArtifacts, PipelineExecutor, RasterPolygonizer,
};
use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Sidecar files of an ESRI Shapefile.
const SHAPEFILE_PARTS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

/// Returns `true` when an engine diagnostic says the query produced no points.
///
/// Matches the words `no points` or `0 points`, so counts such as `10 points` do not.
fn reports_no_points(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    words
        .windows(2)
        .any(|pair| matches!(pair[0], "no" | "0") && pair[1] == "points")
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Runs bound jobs through the PDAL command-line tool.
#[derive(Debug, Clone)]
pub struct PdalExecutor {
    program: PathBuf,
}

impl Default for PdalExecutor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pdal"),
        }
    }
}

impl PdalExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific `pdal` binary instead of the one on `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl PipelineExecutor for PdalExecutor {
    async fn execute(&self, job: &BoundPipeline) -> Result<PipelineArtifacts, ExecutionError> {
        let job_json = job.job_json()?;
        info!("Running PDAL pipeline for {}", job.region);
        debug!("Pipeline job: {job_json}");

        let spawn_error = |source: std::io::Error| ExecutionError::Spawn {
            program: self.program_name(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(["pipeline", "--stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(job_json.as_bytes())
                .await
                .map_err(spawn_error)?;
            // Closing stdin lets PDAL start reading the job.
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;
        if !output.status.success() {
            let stderr = stderr_text(&output);
            if reports_no_points(&stderr) {
                return Err(ExecutionError::NoPoints {
                    region: job.region.clone(),
                    message: stderr,
                });
            }
            return Err(ExecutionError::Failed {
                program: self.program_name(),
                region: job.region.clone(),
                code: output.status.code(),
                stderr,
            });
        }

        if !tokio::fs::try_exists(&job.raster_path).await.unwrap_or(false) {
            return Err(ExecutionError::MissingArtifact {
                path: job.raster_path.clone(),
            });
        }

        info!("PDAL pipeline completed for {}", job.region);
        Ok(PipelineArtifacts {
            point_path: job.point_path.clone(),
            raster_path: job.raster_path.clone(),
        })
    }
}

/// Polygonizes rasters with GDAL and reads the result back as a layer.
///
/// The polygons are persisted as an ESRI Shapefile with layer `Shape` and field
/// `elevation`, then streamed back as `GeoJSON` through `ogr2ogr`.
#[derive(Debug, Clone)]
pub struct GdalPolygonizer {
    polygonize_program: PathBuf,
    ogr2ogr_program: PathBuf,
    mask_nodata: bool,
}

impl Default for GdalPolygonizer {
    fn default() -> Self {
        Self {
            polygonize_program: PathBuf::from("gdal_polygonize.py"),
            ogr2ogr_program: PathBuf::from("ogr2ogr"),
            mask_nodata: false,
        }
    }
}

impl GdalPolygonizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_polygonize_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.polygonize_program = program.into();
        self
    }

    #[must_use]
    pub fn with_ogr2ogr_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ogr2ogr_program = program.into();
        self
    }

    /// Skip no-data cells instead of emitting polygons for them (default: false).
    #[must_use]
    pub fn with_nodata_mask(mut self, mask: bool) -> Self {
        self.mask_nodata = mask;
        self
    }

    async fn run<I, S>(&self, program: &Path, args: I, raster: &Path) -> Result<Output, ExecutionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecutionError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(ExecutionError::Failed {
                program: program.display().to_string(),
                region: raster.display().to_string(),
                code: output.status.code(),
                stderr: stderr_text(&output),
            })
        }
    }
}

/// Removes a previous shapefile so the converter does not append to it.
async fn remove_shapefile(output: &Path) {
    for extension in SHAPEFILE_PARTS {
        let part = output.with_extension(extension);
        if tokio::fs::remove_file(&part).await.is_ok() {
            debug!("Removed stale {}", part.display());
        }
    }
}

#[async_trait]
impl RasterPolygonizer for GdalPolygonizer {
    async fn polygonize(
        &self,
        raster: &Path,
        output: &Path,
    ) -> Result<VectorLayer, ExecutionError> {
        info!("Converting {} to {}", raster.display(), output.display());
        remove_shapefile(output).await;

        let mut args: Vec<&OsStr> = Vec::new();
        if !self.mask_nodata {
            args.push(OsStr::new("-nomask"));
        }
        args.extend([
            raster.as_os_str(),
            OsStr::new("-f"),
            OsStr::new("ESRI Shapefile"),
            output.as_os_str(),
            OsStr::new("Shape"),
            OsStr::new("elevation"),
        ]);
        self.run(&self.polygonize_program, args, raster).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(ExecutionError::MissingArtifact {
                path: output.to_path_buf(),
            });
        }

        let converted = self
            .run(
                &self.ogr2ogr_program,
                [
                    OsStr::new("-f"),
                    OsStr::new("GeoJSON"),
                    OsStr::new("/vsistdout/"),
                    output.as_os_str(),
                ],
                raster,
            )
            .await?;

        let layer = parse_geojson_bytes(&converted.stdout, output.display().to_string())?;
        info!("Read {} polygon(s) from {}", layer.len(), output.display());
        Ok(layer)
    }
}
