//! Status - artifact の在庫状況
//!
//! Computed from descriptors only; no artifact body is read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ArtifactDescriptor, PageId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInventory {
    pub page_id: PageId,
    pub artifacts: usize,
    pub total_bytes: u64,
    pub newest: DateTime<Utc>,
    pub oldest: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    /// Sorted by page id.
    pub pages: Vec<PageInventory>,
    pub total_artifacts: usize,
    pub total_bytes: u64,
}

impl Inventory {
    pub fn from_descriptors(descriptors: &[ArtifactDescriptor]) -> Self {
        let mut by_page: BTreeMap<&PageId, PageInventory> = BTreeMap::new();
        for d in descriptors {
            by_page
                .entry(&d.page_id)
                .and_modify(|page| {
                    page.artifacts += 1;
                    page.total_bytes += d.size_bytes;
                    page.newest = page.newest.max(d.captured_at);
                    page.oldest = page.oldest.min(d.captured_at);
                })
                .or_insert_with(|| PageInventory {
                    page_id: d.page_id.clone(),
                    artifacts: 1,
                    total_bytes: d.size_bytes,
                    newest: d.captured_at,
                    oldest: d.captured_at,
                });
        }

        Self {
            pages: by_page.into_values().collect(),
            total_artifacts: descriptors.len(),
            total_bytes: descriptors.iter().map(|d| d.size_bytes).sum(),
        }
    }

    pub fn page(&self, page_id: &PageId) -> Option<&PageInventory> {
        self.pages.iter().find(|page| &page.page_id == page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactLocation, artifact_name};
    use chrono::TimeZone;

    fn descriptor(page: &str, day: u32, size_bytes: u64) -> ArtifactDescriptor {
        let page_id = PageId::parse(page).unwrap();
        let captured_at = Utc.with_ymd_and_hms(2024, 2, day, 0, 0, 0).unwrap();
        ArtifactDescriptor {
            location: ArtifactLocation::new(artifact_name(&page_id, captured_at)),
            page_id,
            captured_at,
            size_bytes,
        }
    }

    #[test]
    fn aggregates_per_page() {
        let inventory = Inventory::from_descriptors(&[
            descriptor("b", 3, 10),
            descriptor("a", 5, 100),
            descriptor("b", 1, 20),
            descriptor("b", 2, 30),
        ]);

        assert_eq!(inventory.total_artifacts, 4);
        assert_eq!(inventory.total_bytes, 160);
        assert_eq!(inventory.pages[0].page_id.as_str(), "a");

        let b = inventory.page(&PageId::parse("b").unwrap()).unwrap();
        assert_eq!(b.artifacts, 3);
        assert_eq!(b.total_bytes, 60);
        assert_eq!(b.newest, Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap());
        assert_eq!(b.oldest, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn empty_store_is_empty_inventory() {
        assert_eq!(Inventory::from_descriptors(&[]), Inventory::default());
    }
}
