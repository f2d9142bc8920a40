//! Run configuration.
//!
//! Every component receives its settings explicitly through these values; there is no
//! process-wide client or configuration state.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use url::Url;

use crate::error::ConfigError;

/// Public USGS 3DEP lidar bucket.
pub const DEFAULT_BUCKET: &str = "usgs-lidar-public";
/// Region hosting [`DEFAULT_BUCKET`].
pub const DEFAULT_REGION: &str = "us-west-2";
/// HTTP base URL PDAL reads partitions from.
pub const DEFAULT_BASE_URL: &str = "https://s3-us-west-2.amazonaws.com/usgs-lidar-public/";

/// Partitions that publish their metadata as `ept-1.json` instead of `ept.json`.
pub const ALTERNATE_METADATA_PARTITIONS: [&str; 2] = [
    "USGS_LPC_WA_Western_North_2016_LAS_2018/",
    "USGS_LPC_WA_Western_South_2016_LAS_2018/",
];

/// What to do when a metadata request fails at the network layer.
///
/// Documents that arrive but cannot be parsed are always dropped; this policy only
/// covers requests that error out or time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchFailurePolicy {
    /// Abort the whole index build.
    #[default]
    Abort,
    /// Log a warning and leave the partition out of the index.
    Skip,
}

/// Where the archive lives and how to index it.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub bucket: String,
    /// AWS region; falls back to `AWS_REGION`/`AWS_DEFAULT_REGION`, then [`DEFAULT_REGION`].
    pub region: Option<String>,
    /// Base URL handed to `readers.ept`, ending in `/`.
    pub base_url: String,
    /// Maximum in-flight metadata requests (default: 64)
    pub fetch_concurrency: usize,
    /// Per-request timeout (default: 30s)
    pub fetch_timeout: Duration,
    pub failure_policy: FetchFailurePolicy,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            region: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch_concurrency: 64,
            fetch_timeout: Duration::from_secs(30),
            failure_policy: FetchFailurePolicy::Abort,
        }
    }
}

impl ArchiveConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_fetch_concurrency(mut self, limit: usize) -> Self {
        self.fetch_concurrency = limit;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Checks option values that would otherwise fail obscurely later.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a zero concurrency limit or timeout,
    /// or a base URL that does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::InvalidOption {
                option: "fetch_concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidOption {
                option: "fetch_timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidOption {
            option: "base_url".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Name of the metadata document for `region`.
    ///
    /// The exception list is matched exactly; similarly named partitions use the
    /// default file.
    #[must_use]
    pub fn metadata_file(region: &str) -> &'static str {
        if ALTERNATE_METADATA_PARTITIONS.contains(&region) {
            "ept-1.json"
        } else {
            "ept.json"
        }
    }

    /// Object path of the metadata document for `region` inside the bucket.
    #[must_use]
    pub fn metadata_key(region: &str) -> String {
        format!("{region}{}", Self::metadata_file(region))
    }

    /// Public URL of the metadata document, used as the EPT reader's source.
    #[must_use]
    pub fn metadata_url(&self, region: &str) -> String {
        let base = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        format!("{base}{}", Self::metadata_key(region))
    }

    /// Builds an S3 client for the archive.
    ///
    /// Requests are unsigned unless both `AWS_ACCESS_KEY_ID` and
    /// `AWS_SECRET_ACCESS_KEY` are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Store`] if the client cannot be configured.
    pub fn object_store(&self) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        let region = self
            .region
            .clone()
            .or_else(|| env::var("AWS_REGION").ok())
            .or_else(|| env::var("AWS_DEFAULT_REGION").ok())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(self.bucket.clone())
            .with_region(region);

        let has_access_key = env::var("AWS_ACCESS_KEY_ID").is_ok();
        let has_secret_key = env::var("AWS_SECRET_ACCESS_KEY").is_ok();
        if !(has_access_key && has_secret_key) {
            builder = builder.with_skip_signature(true);
        }

        let store = builder
            .build()
            .map_err(|source| ConfigError::Store { source })?;
        Ok(Arc::new(store))
    }
}

/// Options for one multi-region run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Raster cell size in CRS units, also the TWI resolution parameter (default: 5)
    pub resolution: f64,
    /// Directory receiving all artifacts (default: current directory)
    pub work_dir: PathBuf,
    /// Regions processed at once (default: 1, strictly sequential)
    pub concurrency: usize,
    /// Render a PNG preview per region (default: false)
    pub save_png: bool,
    /// Fail a region whose layer contains a non-finite TWI (default: false)
    pub strict_twi: bool,
    /// Write `<region>.geojson` per region (default: false)
    pub export_geojson: bool,
    /// Write `<region>.csv` per region (default: false)
    pub export_csv: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            resolution: 5.0,
            work_dir: PathBuf::from("."),
            concurrency: 1,
            save_png: false,
            strict_twi: false,
            export_geojson: false,
            export_csv: false,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_save_png(mut self, save_png: bool) -> Self {
        self.save_png = save_png;
        self
    }

    #[must_use]
    pub fn with_strict_twi(mut self, strict: bool) -> Self {
        self.strict_twi = strict;
        self
    }

    #[must_use]
    pub fn with_geojson_export(mut self, enabled: bool) -> Self {
        self.export_geojson = enabled;
        self
    }

    #[must_use]
    pub fn with_csv_export(mut self, enabled: bool) -> Self {
        self.export_csv = enabled;
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a non-positive resolution or a zero
    /// concurrency limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(ConfigError::InvalidOption {
                option: "resolution".to_string(),
                message: format!("must be a positive number, got {}", self.resolution),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidOption {
                option: "concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_metadata_file_for_listed_partitions() {
        assert_eq!(
            ArchiveConfig::metadata_key("USGS_LPC_WA_Western_North_2016_LAS_2018/"),
            "USGS_LPC_WA_Western_North_2016_LAS_2018/ept-1.json"
        );
        assert_eq!(
            ArchiveConfig::metadata_key("USGS_LPC_WA_Western_South_2016_LAS_2018/"),
            "USGS_LPC_WA_Western_South_2016_LAS_2018/ept-1.json"
        );
        assert_eq!(
            ArchiveConfig::metadata_key("USGS_LPC_WA_Western_East_2016_LAS_2018/"),
            "USGS_LPC_WA_Western_East_2016_LAS_2018/ept.json"
        );
    }

    #[test]
    fn metadata_url_joins_base() {
        let config = ArchiveConfig::new().with_base_url("https://example.com/bucket");
        assert_eq!(
            config.metadata_url("IA_FullState/"),
            "https://example.com/bucket/IA_FullState/ept.json"
        );
        assert_eq!(
            ArchiveConfig::default().metadata_url("IA_FullState/"),
            "https://s3-us-west-2.amazonaws.com/usgs-lidar-public/IA_FullState/ept.json"
        );
    }

    #[test]
    fn validate_rejects_zero_limits() {
        assert!(ArchiveConfig::new().validate().is_ok());
        assert!(ArchiveConfig::new().with_fetch_concurrency(0).validate().is_err());
        assert!(RunOptions::new().with_resolution(0.0).validate().is_err());
        assert!(RunOptions::new().with_concurrency(0).validate().is_err());
    }
}
