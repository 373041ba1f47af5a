//! Retention policy: which artifacts to keep.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactDescriptor;
use super::ids::PageId;

/// Count- and age-based eviction limits. `None` means unlimited.
///
/// The two limits apply independently: an artifact is evicted when it falls
/// outside the newest `max_artifacts_per_page` of its page OR is older than
/// `max_age_days`, whichever fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetentionPolicy {
    #[serde(default)]
    pub max_artifacts_per_page: Option<usize>,

    #[serde(default)]
    pub max_age_days: Option<u32>,
}

impl RetentionPolicy {
    pub fn new(max_artifacts_per_page: usize, max_age_days: u32) -> Self {
        Self {
            max_artifacts_per_page: Some(max_artifacts_per_page),
            max_age_days: Some(max_age_days),
        }
    }

    pub fn keep_latest(max_artifacts_per_page: usize) -> Self {
        Self {
            max_artifacts_per_page: Some(max_artifacts_per_page),
            max_age_days: None,
        }
    }

    pub fn max_age(max_age_days: u32) -> Self {
        Self {
            max_artifacts_per_page: None,
            max_age_days: Some(max_age_days),
        }
    }

    /// Pure selection step: indices into `descriptors` that should be evicted,
    /// in ascending order.
    pub fn select_evictions(
        &self,
        descriptors: &[ArtifactDescriptor],
        now: DateTime<Utc>,
    ) -> Vec<usize> {
        let mut marked = BTreeSet::new();

        if let Some(max_count) = self.max_artifacts_per_page {
            let mut by_page: HashMap<&PageId, Vec<usize>> = HashMap::new();
            for (idx, descriptor) in descriptors.iter().enumerate() {
                by_page.entry(&descriptor.page_id).or_default().push(idx);
            }
            for mut group in by_page.into_values() {
                if group.len() <= max_count {
                    continue;
                }
                group.sort_by_key(|&idx| descriptors[idx].captured_at);
                let excess = group.len() - max_count;
                marked.extend(group.into_iter().take(excess));
            }
        }

        if let Some(max_days) = self.max_age_days {
            let max_age = chrono::Duration::days(i64::from(max_days));
            for (idx, descriptor) in descriptors.iter().enumerate() {
                if descriptor.age(now) > max_age {
                    marked.insert(idx);
                }
            }
        }

        marked.into_iter().collect()
    }
}
