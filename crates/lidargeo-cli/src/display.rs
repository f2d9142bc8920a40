//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting partitions and derived layers in a human-readable format.

use tabled::{Table, Tabled};

use lidargeo_core::utils::region_label;
use lidargeo_core::{PartitionDescriptor, ResultSet};

/// Table row representation for displaying a matching partition.
#[derive(Tabled)]
pub struct RegionRow {
    /// Partition identifier, with trailing `/`.
    #[tabled(rename = "Region")]
    pub id: String,
    /// Label the region's layer will be stored under.
    #[tabled(rename = "Label")]
    pub label: String,
    /// Number of points in the partition.
    #[tabled(rename = "Points")]
    pub points: u64,
    /// Horizontal EPSG code.
    #[tabled(rename = "EPSG")]
    pub epsg: String,
}

/// Table row representation for displaying one derived layer.
#[derive(Tabled)]
pub struct LayerRow {
    #[tabled(rename = "Label")]
    pub label: String,
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Features")]
    pub features: usize,
    /// Features whose TWI is NaN or infinite.
    #[tabled(rename = "Non-finite TWI")]
    pub non_finite: usize,
}

/// Table row representation for a region that produced no layer.
#[derive(Tabled)]
pub struct SkippedRow {
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Reason")]
    pub reason: String,
}

/// Table row representation for displaying a schema dimension.
#[derive(Tabled)]
pub struct DimensionRow {
    #[tabled(rename = "Dimension")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub dtype: String,
    #[tabled(rename = "Scale")]
    pub scale: String,
    #[tabled(rename = "Offset")]
    pub offset: String,
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Display the partitions containing a bounding box.
pub fn display_regions(partitions: &[PartitionDescriptor]) {
    if partitions.is_empty() {
        println!("\nNo partition contains the requested bounds.");
        return;
    }

    println!("\nMatching Regions ({} total):\n", partitions.len());
    let rows: Vec<RegionRow> = partitions
        .iter()
        .map(|p| RegionRow {
            id: p.id.clone(),
            label: region_label(&p.id),
            points: p.points,
            epsg: p
                .srs
                .epsg()
                .map_or_else(|| "N/A".to_string(), |code| code.to_string()),
        })
        .collect();
    println!("{}", Table::new(rows));
}

/// Display the layers and skipped regions of a run.
pub fn display_results(results: &ResultSet) {
    if results.is_empty() {
        println!("\nNo layers were produced.");
    } else {
        println!("\nDerived Layers ({} total):\n", results.len());
        let rows: Vec<LayerRow> = results
            .iter()
            .map(|(label, entry)| LayerRow {
                label: label.to_string(),
                region: entry.region.clone(),
                features: entry.layer.len(),
                non_finite: entry.quality.non_finite_twi.len(),
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    if !results.skipped.is_empty() {
        println!("\n=== Skipped Regions ===");
        let rows: Vec<SkippedRow> = results
            .skipped
            .iter()
            .map(|s| SkippedRow {
                region: s.region.clone(),
                reason: s.reason.clone(),
            })
            .collect();
        println!("{}", Table::new(rows));
    }
}

/// Display the metadata and schema of one partition.
pub fn display_partition(partition: &PartitionDescriptor) {
    let b = &partition.bounds;
    println!("\nRegion: {}", partition.id);
    println!("Label: {}", region_label(&partition.id));
    println!("Points: {}", partition.points);
    println!(
        "Bounds: X [{}, {}]  Y [{}, {}]  Z [{}, {}]",
        b.min_x, b.max_x, b.min_y, b.max_y, b.min_z, b.max_z
    );
    println!("Span: {}", partition.span);
    println!("Version: {}", partition.version);
    println!("Data Type: {}", partition.data_type);
    println!("Hierarchy Type: {}", partition.hierarchy_type);
    match partition.srs.epsg() {
        Some(code) => println!("SRS: EPSG:{code}"),
        None => println!("SRS: {}", partition.srs.wkt),
    }
    if let Some(vertical) = &partition.srs.vertical {
        println!("Vertical SRS: {vertical}");
    }

    println!(
        "\n=== Schema ({} dimensions, {} bytes per point) ===",
        partition.schema.len(),
        partition.schema.record_size()
    );
    let rows: Vec<DimensionRow> = partition
        .schema
        .dimensions()
        .iter()
        .map(|d| DimensionRow {
            name: d.name.clone(),
            dtype: d.dtype(),
            scale: optional(d.scale),
            offset: optional(d.offset),
        })
        .collect();
    println!("{}", Table::new(rows));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_formatting() {
        assert_eq!(optional(Some(0.01)), "0.01");
        assert_eq!(optional(None), "-");
    }
}
