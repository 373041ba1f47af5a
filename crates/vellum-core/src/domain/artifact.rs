//! Artifact naming and descriptors.
//!
//! An artifact is named `page_<pageId>_<timestamp>.json`, where the timestamp
//! is RFC 3339 in UTC at microsecond resolution with every `:` replaced by
//! `-` (colons are not portable in file names). The name alone is enough to
//! recover the page id and capture time, so listing and retention never need
//! to open an artifact.

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::ids::PageId;

pub const ARTIFACT_PREFIX: &str = "page_";
pub const ARTIFACT_EXTENSION: &str = ".json";

/// Opaque handle to a stored artifact (a path for on-disk stores).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactLocation(String);

impl ArtifactLocation {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata parsed from an artifact's name plus its size on the medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub page_id: PageId,
    pub captured_at: DateTime<Utc>,
    pub location: ArtifactLocation,
    pub size_bytes: u64,
}

impl ArtifactDescriptor {
    /// Age relative to `now`; negative ages (clock skew) count as zero.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.captured_at).max(chrono::Duration::zero())
    }
}

/// Capture times are kept at the resolution the name can represent.
pub fn normalize_capture_time(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

/// Name prefix shared by every artifact of `page_id`.
pub fn page_prefix(page_id: &PageId) -> String {
    format!("{ARTIFACT_PREFIX}{page_id}_")
}

pub fn artifact_name(page_id: &PageId, captured_at: DateTime<Utc>) -> String {
    let stamp = captured_at
        .to_rfc3339_opts(SecondsFormat::Micros, true)
        .replace(':', "-");
    format!("{}{stamp}{ARTIFACT_EXTENSION}", page_prefix(page_id))
}

/// Inverse of [`artifact_name`]. Returns `None` for anything that is not an
/// artifact name; callers skip those instead of failing.
pub fn parse_artifact_name(name: &str) -> Option<(PageId, DateTime<Utc>)> {
    let body = name
        .strip_prefix(ARTIFACT_PREFIX)?
        .strip_suffix(ARTIFACT_EXTENSION)?;
    // Timestamps never contain '_', page ids might.
    let (raw_page, stamp) = body.rsplit_once('_')?;
    let page_id = PageId::parse(raw_page).ok()?;

    // Only the time-of-day half had its colons substituted.
    let (date, time) = stamp.split_once('T')?;
    let restored = format!("{date}T{}", time.replace('-', ":"));
    let captured_at = DateTime::parse_from_rfc3339(&restored)
        .ok()?
        .with_timezone(&Utc);
    Some((page_id, captured_at))
}
