//! Content blocks: one node of a page's content tree.
//!
//! A block is an opaque record tagged by its `type`. The type-keyed payload is
//! never interpreted; it is carried as an untyped JSON document so a snapshot
//! can be restored byte-for-byte, including block types this crate has never
//! heard of.
//!
//! Wire shape (one record per block, payload merged under its own type key):
//!
//! ```json
//! {
//!   "id": "b1",
//!   "type": "paragraph",
//!   "paragraph": { "rich_text": [] },
//!   "has_children": true,
//!   "created_time": "2024-01-01T00:00:00.000Z",
//!   "last_edited_time": "2024-01-01T00:00:00.000Z",
//!   "children": [ ... ]
//! }
//! ```

use std::fmt;

use serde::de::{self, Deserializer, Error as _};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::BlockId;

const RESERVED_KEYS: [&str; 6] = [
    "id",
    "type",
    "has_children",
    "created_time",
    "last_edited_time",
    "children",
];

/// Block type discriminator.
///
/// Known kinds are enumerated; anything else lands in `Other` with its
/// original spelling so it survives a round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    BulletedListItem,
    NumberedListItem,
    ToDo,
    Toggle,
    Quote,
    Callout,
    Code,
    Divider,
    Image,
    Bookmark,
    Table,
    TableRow,
    ChildPage,
    ChildDatabase,
    SyncedBlock,
    ColumnList,
    Column,
    Other(String),
}

impl BlockKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Heading1 => "heading_1",
            Self::Heading2 => "heading_2",
            Self::Heading3 => "heading_3",
            Self::BulletedListItem => "bulleted_list_item",
            Self::NumberedListItem => "numbered_list_item",
            Self::ToDo => "to_do",
            Self::Toggle => "toggle",
            Self::Quote => "quote",
            Self::Callout => "callout",
            Self::Code => "code",
            Self::Divider => "divider",
            Self::Image => "image",
            Self::Bookmark => "bookmark",
            Self::Table => "table",
            Self::TableRow => "table_row",
            Self::ChildPage => "child_page",
            Self::ChildDatabase => "child_database",
            Self::SyncedBlock => "synced_block",
            Self::ColumnList => "column_list",
            Self::Column => "column",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for BlockKind {
    fn from(raw: &str) -> Self {
        match raw {
            "paragraph" => Self::Paragraph,
            "heading_1" => Self::Heading1,
            "heading_2" => Self::Heading2,
            "heading_3" => Self::Heading3,
            "bulleted_list_item" => Self::BulletedListItem,
            "numbered_list_item" => Self::NumberedListItem,
            "to_do" => Self::ToDo,
            "toggle" => Self::Toggle,
            "quote" => Self::Quote,
            "callout" => Self::Callout,
            "code" => Self::Code,
            "divider" => Self::Divider,
            "image" => Self::Image,
            "bookmark" => Self::Bookmark,
            "table" => Self::Table,
            "table_row" => Self::TableRow,
            "child_page" => Self::ChildPage,
            "child_database" => Self::ChildDatabase,
            "synced_block" => Self::SyncedBlock,
            "column_list" => Self::ColumnList,
            "column" => Self::Column,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single block, optionally carrying its materialized children.
///
/// `children` is `None` when the subtree was not fetched (depth budget
/// exhausted, or the block has no children). `Some(vec![])` means the
/// subtree was fetched and turned out empty. The two must not be confused.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    /// Absent on blocks about to be created.
    pub id: Option<BlockId>,
    pub kind: BlockKind,
    /// Type-keyed payload, `None` when the record had no entry under its type key.
    pub payload: Option<Value>,
    pub has_children: bool,
    pub created_time: Option<String>,
    pub last_edited_time: Option<String>,
    pub children: Option<Vec<ContentBlock>>,
}

impl ContentBlock {
    /// New block without an id, ready to be appended.
    pub fn new(kind: BlockKind, payload: Value) -> Self {
        Self {
            id: None,
            kind,
            payload: Some(payload),
            has_children: false,
            created_time: None,
            last_edited_time: None,
            children: None,
        }
    }

    pub fn with_id(mut self, id: BlockId) -> Self {
        self.id = Some(id);
        self
    }

    /// Attach materialized children and flag the block accordingly.
    pub fn with_children(mut self, children: Vec<ContentBlock>) -> Self {
        self.has_children = true;
        self.children = Some(children);
        self
    }

    /// Copy suitable for re-creation: no id, no timestamps, no nested children.
    pub fn detached(&self) -> Self {
        Self {
            id: None,
            kind: self.kind.clone(),
            payload: self.payload.clone(),
            has_children: false,
            created_time: None,
            last_edited_time: None,
            children: None,
        }
    }

    /// `{ "type": .., <type>: payload }`, the shape the gateway accepts for creation.
    pub fn creation_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("object".to_string(), Value::from("block"));
        body.insert("type".to_string(), Value::from(self.kind.as_str()));
        if let Some(payload) = &self.payload {
            body.insert(self.kind.as_str().to_string(), payload.clone());
        }
        Value::Object(body)
    }

    /// Number of blocks in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(ContentBlock::subtree_len)
            .sum::<usize>()
    }

    /// Depth of the materialized subtree (a leaf is 1).
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(ContentBlock::depth)
            .max()
            .unwrap_or(0)
    }
}

impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        map.serialize_entry("type", self.kind.as_str())?;
        if let Some(payload) = &self.payload {
            map.serialize_entry(self.kind.as_str(), payload)?;
        }
        map.serialize_entry("has_children", &self.has_children)?;
        if let Some(created) = &self.created_time {
            map.serialize_entry("created_time", created)?;
        }
        if let Some(edited) = &self.last_edited_time {
            map.serialize_entry("last_edited_time", edited)?;
        }
        if let Some(children) = &self.children {
            map.serialize_entry("children", children)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut record = Map::<String, Value>::deserialize(deserializer)?;

        let kind = match record.remove("type") {
            Some(Value::String(raw)) => BlockKind::from(raw.as_str()),
            Some(_) => return Err(de::Error::custom("block `type` must be a string")),
            None => return Err(de::Error::missing_field("type")),
        };
        if RESERVED_KEYS.contains(&kind.as_str()) {
            return Err(de::Error::custom(format!(
                "block type `{kind}` collides with a reserved key"
            )));
        }

        let id = match record.remove("id") {
            Some(Value::String(raw)) => Some(BlockId::parse(raw).map_err(D::Error::custom)?),
            Some(Value::Null) | None => None,
            Some(_) => return Err(de::Error::custom("block `id` must be a string")),
        };
        let payload = record.remove(kind.as_str());
        let has_children = match record.remove("has_children") {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Null) | None => false,
            Some(_) => return Err(de::Error::custom("`has_children` must be a boolean")),
        };
        let created_time = optional_string(&mut record, "created_time")?;
        let last_edited_time = optional_string(&mut record, "last_edited_time")?;
        let children = match record.remove("children") {
            Some(Value::Null) | None => None,
            Some(value) => Some(
                serde_json::from_value::<Vec<ContentBlock>>(value).map_err(D::Error::custom)?,
            ),
        };

        Ok(Self {
            id,
            kind,
            payload,
            has_children,
            created_time,
            last_edited_time,
            children,
        })
    }
}

fn optional_string<E: de::Error>(
    record: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, E> {
    match record.remove(key) {
        Some(Value::String(raw)) => Ok(Some(raw)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(E::custom(format!("`{key}` must be a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_kinds_survive_round_trip() {
        let raw = json!({
            "id": "b1",
            "type": "ai_block",
            "ai_block": {"prompt": "x", "nested": {"z": 1, "a": [true, null]}},
            "has_children": false,
            "created_time": "2024-01-01T00:00:00.000Z"
        });

        let block: ContentBlock = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(block.kind, BlockKind::Other("ai_block".to_string()));
        assert!(!block.kind.is_known());

        let text = serde_json::to_string(&block).unwrap();
        assert_eq!(text, serde_json::to_string(&raw).unwrap());
    }

    #[test]
    fn extra_wire_fields_are_dropped() {
        let raw = json!({
            "object": "block",
            "id": "b1",
            "parent": {"type": "page_id", "page_id": "p1"},
            "type": "divider",
            "divider": {},
            "has_children": false,
            "archived": false
        });
        let block: ContentBlock = serde_json::from_value(raw).unwrap();
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({"id": "b1", "type": "divider", "divider": {}, "has_children": false})
        );
    }

    #[test]
    fn absent_children_differ_from_empty_children() {
        let unfetched: ContentBlock =
            serde_json::from_value(json!({"type": "toggle", "toggle": {}, "has_children": true}))
                .unwrap();
        assert!(unfetched.children.is_none());

        let empty = unfetched.clone().with_children(Vec::new());
        let value = serde_json::to_value(&empty).unwrap();
        assert_eq!(value["children"], json!([]));
        assert!(serde_json::to_value(&unfetched).unwrap().get("children").is_none());
    }

    #[test]
    fn nested_children_deserialize_recursively() {
        let raw = json!({
            "id": "b1", "type": "toggle", "toggle": {}, "has_children": true,
            "children": [
                {"id": "b2", "type": "paragraph", "paragraph": {}, "has_children": true,
                 "children": [{"id": "b3", "type": "paragraph", "paragraph": {}, "has_children": false}]}
            ]
        });
        let block: ContentBlock = serde_json::from_value(raw).unwrap();
        assert_eq!(block.subtree_len(), 3);
        assert_eq!(block.depth(), 3);
    }

    #[test]
    fn detached_strips_identity_and_children() {
        let block = ContentBlock::new(BlockKind::Toggle, json!({"rich_text": []}))
            .with_id(BlockId::parse("b1").unwrap())
            .with_children(vec![ContentBlock::new(BlockKind::Paragraph, json!({}))]);

        let detached = block.detached();
        assert!(detached.id.is_none());
        assert!(detached.children.is_none());
        assert_eq!(detached.payload, block.payload);
        assert_eq!(
            detached.creation_body(),
            json!({"object": "block", "type": "toggle", "toggle": {"rich_text": []}})
        );
    }

    #[test]
    fn missing_type_is_rejected() {
        let result: Result<ContentBlock, _> = serde_json::from_value(json!({"id": "b1"}));
        assert!(result.is_err());
    }
}
