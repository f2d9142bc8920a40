//! Selects the partitions that cover a query box.

use log::info;

use crate::metadata::MetadataIndex;
use crate::types::BoundingBox;

/// Returns the ids of every partition whose extent fully contains `bbox`.
///
/// Partitions that merely overlap the box are not returned. Ids come back in index
/// order; an empty result is not an error.
#[must_use]
pub fn resolve(index: &MetadataIndex, bbox: &BoundingBox) -> Vec<String> {
    let regions: Vec<String> = index
        .iter()
        .filter(|partition| partition.bounds.contains(bbox))
        .map(|partition| partition.id.clone())
        .collect();

    if regions.is_empty() {
        info!("No partition contains {bbox}");
    } else {
        info!("Region(s) containing {bbox}: {}", regions.join(", "));
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::parse_descriptor;
    use crate::metadata::tests::ept_document;

    fn index() -> MetadataIndex {
        MetadataIndex::from_descriptors([
            parse_descriptor("A_2010/", ept_document([0.0, 0.0, 0.0, 100.0, 100.0, 10.0]).as_bytes())
                .unwrap(),
            parse_descriptor("B_2012/", ept_document([50.0, 50.0, 0.0, 200.0, 200.0, 10.0]).as_bytes())
                .unwrap(),
            parse_descriptor("C_2014/", ept_document([0.0, 0.0, 0.0, 300.0, 300.0, 10.0]).as_bytes())
                .unwrap(),
        ])
    }

    #[test]
    fn test_resolve_requires_containment() {
        let bbox = BoundingBox::new(40.0, 60.0, 40.0, 60.0).unwrap();
        // B only overlaps the box.
        assert_eq!(resolve(&index(), &bbox), vec!["A_2010/", "C_2014/"]);
    }

    #[test]
    fn test_resolve_touching_edges_count() {
        let bbox = BoundingBox::new(50.0, 200.0, 50.0, 200.0).unwrap();
        assert_eq!(resolve(&index(), &bbox), vec!["B_2012/", "C_2014/"]);
    }

    #[test]
    fn test_resolve_no_match() {
        let bbox = BoundingBox::new(-10.0, 5.0, -10.0, 5.0).unwrap();
        assert!(resolve(&index(), &bbox).is_empty());
        assert!(resolve(&MetadataIndex::default(), &bbox).is_empty());
    }
}
