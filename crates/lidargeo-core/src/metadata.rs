//! Archive listing and partition metadata index.
//!
//! [`MetadataIndex::build`] lists the partitions of the archive, fetches every
//! partition's EPT metadata document concurrently, and parses each into a
//! [`PartitionDescriptor`]. Documents that cannot be parsed are left out of the index;
//! unsupported schema types and (by default) unreachable documents abort the build.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use object_store::ObjectStore;
use object_store::path::Path;
use serde::Deserialize;
use tokio::time::timeout;

use crate::config::{ArchiveConfig, FetchFailurePolicy};
use crate::error::MetadataError;
use crate::types::{Bounds, Dimension, DimensionKind, PartitionDescriptor, Schema, Srs};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEpt {
    bounds: Vec<f64>,
    bounds_conforming: Vec<f64>,
    data_type: String,
    hierarchy_type: String,
    // Some documents publish the count as a float.
    points: f64,
    schema: Vec<RawDimension>,
    span: u64,
    srs: RawSrs,
    version: String,
}

#[derive(Debug, Deserialize)]
struct RawDimension {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    size: u32,
    #[serde(default)]
    scale: Option<f64>,
    #[serde(default)]
    offset: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSrs {
    wkt: String,
    #[serde(default)]
    authority: Option<String>,
    #[serde(default)]
    horizontal: Option<String>,
    #[serde(default)]
    vertical: Option<String>,
}

/// Normalises an archive prefix so it always ends with a single `/`.
fn normalise_id(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

/// Parses one EPT metadata document.
///
/// # Errors
///
/// Returns [`MetadataError::Parse`] if the document is not valid JSON, lacks a required
/// key, or has fewer than six bounds values, and
/// [`MetadataError::UnsupportedSchemaType`] if a dimension type is not
/// `unsigned`, `signed` or `float`.
pub fn parse_descriptor(id: &str, document: &[u8]) -> Result<PartitionDescriptor, MetadataError> {
    let raw: RawEpt = serde_json::from_slice(document).map_err(|e| MetadataError::Parse {
        region: id.to_string(),
        message: e.to_string(),
    })?;

    let bounds = Bounds::from_slice(&raw.bounds).ok_or_else(|| MetadataError::Parse {
        region: id.to_string(),
        message: format!("'bounds' has {} values, expected 6", raw.bounds.len()),
    })?;

    let dimensions = raw
        .schema
        .into_iter()
        .map(|dim| {
            let kind = DimensionKind::from_ept(&dim.kind).ok_or_else(|| {
                MetadataError::UnsupportedSchemaType {
                    region: id.to_string(),
                    dimension: dim.name.clone(),
                    kind: dim.kind.clone(),
                }
            })?;
            Ok(Dimension {
                name: dim.name,
                kind,
                size: dim.size,
                scale: dim.scale,
                offset: dim.offset,
            })
        })
        .collect::<Result<Vec<_>, MetadataError>>()?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let points = raw.points.trunc() as u64;

    Ok(PartitionDescriptor {
        id: id.to_string(),
        bounds,
        raw_bounds: raw.bounds,
        bounds_conforming: raw.bounds_conforming,
        points,
        schema: Schema::new(dimensions),
        span: raw.span,
        version: raw.version,
        data_type: raw.data_type,
        hierarchy_type: raw.hierarchy_type,
        srs: Srs {
            wkt: raw.srs.wkt,
            authority: raw.srs.authority,
            horizontal: raw.srs.horizontal,
            vertical: raw.srs.vertical,
        },
    })
}

/// Fetches the metadata document of one partition.
async fn fetch_document(
    store: &dyn ObjectStore,
    id: &str,
    limit: Duration,
) -> Result<Bytes, MetadataError> {
    let path = Path::from(ArchiveConfig::metadata_key(id));
    let request = async {
        match store.get(&path).await {
            Ok(result) => result.bytes().await,
            Err(e) => Err(e),
        }
    };

    match timeout(limit, request).await {
        Ok(Ok(bytes)) => Ok(bytes),
        // A missing document is handled like an unreadable one.
        Ok(Err(object_store::Error::NotFound { .. })) => Err(MetadataError::Parse {
            region: id.to_string(),
            message: format!("'{path}' does not exist"),
        }),
        Ok(Err(source)) => Err(MetadataError::Network {
            region: id.to_string(),
            source,
        }),
        Err(_) => Err(MetadataError::Timeout {
            region: id.to_string(),
            timeout: limit,
        }),
    }
}

/// Applies the failure policy to one fetch-and-parse outcome.
///
/// `Ok(None)` means the partition is dropped from the index.
fn settle(
    id: &str,
    outcome: Result<PartitionDescriptor, MetadataError>,
    policy: FetchFailurePolicy,
) -> Result<Option<PartitionDescriptor>, MetadataError> {
    match outcome {
        Ok(descriptor) => Ok(Some(descriptor)),
        Err(err @ MetadataError::Parse { .. }) => {
            warn!("Skipping partition {id}: {err}");
            Ok(None)
        },
        Err(err @ (MetadataError::Network { .. } | MetadataError::Timeout { .. }))
            if policy == FetchFailurePolicy::Skip =>
        {
            warn!("Skipping unreachable partition {id}: {err}");
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

/// Index of every well-formed partition in the archive, keyed by id.
///
/// Iteration is in lexicographic id order.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    partitions: BTreeMap<String, PartitionDescriptor>,
}

impl MetadataIndex {
    /// Lists the archive and fetches all partition metadata.
    ///
    /// At most `config.fetch_concurrency` requests are in flight, each bounded by
    /// `config.fetch_timeout`. The resulting index does not depend on completion order.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Listing`] if the archive cannot be listed,
    /// [`MetadataError::UnsupportedSchemaType`] for an unknown schema type, and
    /// [`MetadataError::Network`] or [`MetadataError::Timeout`] for an unreachable
    /// document under [`FetchFailurePolicy::Abort`].
    pub async fn build(store: &dyn ObjectStore, config: &ArchiveConfig) -> Result<Self, MetadataError> {
        let listing = store
            .list_with_delimiter(None)
            .await
            .map_err(|source| MetadataError::Listing { source })?;

        let ids: Vec<String> = listing
            .common_prefixes
            .iter()
            .map(|prefix| normalise_id(prefix.as_ref()))
            .collect();
        info!(
            "Fetching metadata for {} partition(s) ({} concurrent, {:?} timeout)",
            ids.len(),
            config.fetch_concurrency,
            config.fetch_timeout
        );

        let limit = config.fetch_timeout;
        let mut fetches = stream::iter(ids)
            .map(|id| async move {
                let outcome = fetch_document(store, &id, limit)
                    .await
                    .and_then(|document| parse_descriptor(&id, &document));
                (id, outcome)
            })
            .buffer_unordered(config.fetch_concurrency.max(1));

        let mut partitions = BTreeMap::new();
        while let Some((id, outcome)) = fetches.next().await {
            if let Some(descriptor) = settle(&id, outcome, config.failure_policy)? {
                debug!("Indexed partition {id} ({} points)", descriptor.points);
                partitions.insert(id, descriptor);
            }
        }

        info!("Indexed {} partition(s)", partitions.len());
        Ok(Self { partitions })
    }

    /// Builds an index from descriptors that are already parsed.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = PartitionDescriptor>) -> Self {
        Self {
            partitions: descriptors
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }

    /// Looks a partition up by id. A missing trailing `/` is tolerated.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PartitionDescriptor> {
        self.partitions
            .get(id)
            .or_else(|| self.partitions.get(&normalise_id(id)))
    }

    /// Like [`get`](Self::get), but reports a missing partition as an error.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::UnknownPartition`] if the id is not indexed.
    pub fn descriptor(&self, id: &str) -> Result<&PartitionDescriptor, MetadataError> {
        self.get(id).ok_or_else(|| MetadataError::UnknownPartition {
            region: id.to_string(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionDescriptor> {
        self.partitions.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use object_store::PutPayload;
    use object_store::memory::InMemory;
    use object_store::throttle::{ThrottleConfig, ThrottledStore};
    use serde_json::json;

    pub(crate) fn ept_document(bounds: [f64; 6]) -> String {
        json!({
            "bounds": bounds,
            "boundsConforming": bounds,
            "dataType": "laszip",
            "hierarchyType": "json",
            "points": 1_234_567.0,
            "schema": [
                { "name": "X", "type": "signed", "size": 4, "scale": 0.01, "offset": 0.0 },
                { "name": "Y", "type": "signed", "size": 4, "scale": 0.01, "offset": 0.0 },
                { "name": "Z", "type": "signed", "size": 4, "scale": 0.01, "offset": 0.0 },
                { "name": "Intensity", "type": "unsigned", "size": 2 },
                { "name": "GpsTime", "type": "float", "size": 8 }
            ],
            "span": 128,
            "srs": {
                "authority": "EPSG",
                "horizontal": "3857",
                "vertical": "5703",
                "wkt": "PROJCS[\"WGS 84 / Pseudo-Mercator\"]"
            },
            "version": "1.0.0"
        })
        .to_string()
    }

    async fn put(store: &InMemory, key: &str, body: String) {
        store
            .put(&Path::from(key), PutPayload::from(body.into_bytes()))
            .await
            .unwrap();
    }

    #[test]
    fn test_parse_descriptor() {
        let doc = ept_document([0.0, 1.0, -5.0, 10.0, 11.0, 50.0]);
        let descriptor = parse_descriptor("IA_2010/", doc.as_bytes()).unwrap();

        assert_eq!(descriptor.id, "IA_2010/");
        assert_eq!(descriptor.points, 1_234_567);
        assert_eq!(descriptor.bounds.max_y, 11.0);
        assert_eq!(descriptor.schema.len(), 5);
        assert_eq!(descriptor.schema.record_size(), 22);
        assert_eq!(descriptor.schema.dimension("GpsTime").unwrap().dtype(), "f8");
        assert_eq!(descriptor.srs.epsg(), Some(3857));
    }

    #[test]
    fn test_parse_missing_key() {
        let err = parse_descriptor("IA_2010/", br#"{"points": 10}"#).unwrap_err();
        assert!(matches!(err, MetadataError::Parse { .. }));
    }

    #[test]
    fn test_parse_unsupported_schema_type() {
        let doc = ept_document([0.0; 6]).replace("\"unsigned\"", "\"complex\"");
        let err = parse_descriptor("IA_2010/", doc.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MetadataError::UnsupportedSchemaType { ref dimension, ref kind, .. }
                if dimension == "Intensity" && kind == "complex"
        ));
    }

    #[test]
    fn test_settle_applies_policy() {
        let timeout = || MetadataError::Timeout {
            region: "A/".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(settle("A/", Err(timeout()), FetchFailurePolicy::Abort).is_err());
        assert!(matches!(settle("A/", Err(timeout()), FetchFailurePolicy::Skip), Ok(None)));

        let parse = MetadataError::Parse {
            region: "A/".to_string(),
            message: "bad".to_string(),
        };
        assert!(matches!(settle("A/", Err(parse), FetchFailurePolicy::Abort), Ok(None)));
    }

    #[tokio::test]
    async fn test_build_drops_malformed_documents() {
        let store = InMemory::new();
        put(&store, "B_2012/ept.json", ept_document([0.0; 6])).await;
        put(&store, "A_2010/ept.json", ept_document([1.0; 6])).await;
        put(&store, "C_2014/ept.json", "{not json".to_string()).await;

        let index = MetadataIndex::build(&store, &ArchiveConfig::default())
            .await
            .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.ids().collect::<Vec<_>>(), vec!["A_2010/", "B_2012/"]);
        assert!(index.get("C_2014/").is_none());
        assert!(index.get("A_2010").is_some());
    }

    #[tokio::test]
    async fn test_build_drops_missing_documents() {
        let store = InMemory::new();
        put(&store, "A_2010/ept.json", ept_document([0.0; 6])).await;
        put(&store, "B_2012/ept-data/0-0-0-0.laz", String::new()).await;

        let index = MetadataIndex::build(&store, &ArchiveConfig::default())
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_build_aborts_on_unsupported_schema_type() {
        let store = InMemory::new();
        put(&store, "A_2010/ept.json", ept_document([0.0; 6])).await;
        put(
            &store,
            "B_2012/ept.json",
            ept_document([0.0; 6]).replace("\"float\"", "\"decimal\""),
        )
        .await;

        let err = MetadataIndex::build(&store, &ArchiveConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnsupportedSchemaType { .. }));
    }

    #[tokio::test]
    async fn test_build_reads_alternate_metadata_file() {
        let store = InMemory::new();
        let id = "USGS_LPC_WA_Western_North_2016_LAS_2018";
        put(&store, &format!("{id}/ept-1.json"), ept_document([0.0; 6])).await;

        let index = MetadataIndex::build(&store, &ArchiveConfig::default())
            .await
            .unwrap();
        assert!(index.get(&format!("{id}/")).is_some());
    }

    async fn slow_archive() -> ThrottledStore<InMemory> {
        let store = InMemory::new();
        put(&store, "A_2010/ept.json", ept_document([0.0; 6])).await;
        ThrottledStore::new(
            store,
            ThrottleConfig {
                wait_get_per_call: Duration::from_millis(200),
                ..ThrottleConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_build_aborts_on_fetch_timeout() {
        let config = ArchiveConfig::default().with_fetch_timeout(Duration::from_millis(20));

        let err = MetadataIndex::build(&slow_archive().await, &config)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Timeout { ref region, timeout }
                if region == "A_2010/" && timeout == Duration::from_millis(20)
        ));
    }

    #[tokio::test]
    async fn test_build_skips_timed_out_partitions() {
        let config = ArchiveConfig::default()
            .with_fetch_timeout(Duration::from_millis(20))
            .with_failure_policy(FetchFailurePolicy::Skip);

        let index = MetadataIndex::build(&slow_archive().await, &config)
            .await
            .unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_build_empty_archive() {
        let store = InMemory::new();
        let index = MetadataIndex::build(&store, &ArchiveConfig::default())
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(matches!(
            index.descriptor("missing/"),
            Err(MetadataError::UnknownPartition { .. })
        ));
    }
}
