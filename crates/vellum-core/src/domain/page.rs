//! Page metadata and the snapshot unit of recoverability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::block::ContentBlock;
use super::ids::PageId;

/// Property name -> typed value, exactly as the remote schema returned it.
pub type Properties = Map<String, Value>;

/// Page metadata as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: PageId,

    #[serde(default)]
    pub properties: Properties,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_time: Option<String>,
}

impl PageRecord {
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            properties: Properties::new(),
            url: None,
            created_time: None,
            last_edited_time: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// A page's full content at one point in time.
///
/// Serialized as `{"page": {...}, "captured_at": "...", "blocks": [...]}`.
/// `captured_at` is optional on disk: older artifacts only carry it in
/// their name, and the store fills it in from there when loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub page: PageRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

impl PageSnapshot {
    pub fn page_id(&self) -> &PageId {
        &self.page.id
    }

    pub fn properties(&self) -> &Properties {
        &self.page.properties
    }

    /// Total number of materialized blocks at every level.
    pub fn block_count(&self) -> usize {
        self.blocks.iter().map(ContentBlock::subtree_len).sum()
    }
}
