//! Domain identifiers (strongly-typed IDs).
//!
//! The remote workspace hands out opaque string identifiers for pages and
//! blocks. Both are strings on the wire, but mixing them up is always a bug
//! (a page id passed where a block id is expected), so they share one generic
//! implementation and differ only in a zero-sized marker type.
//!
//! ## Phantom Type パターン
//! `Id<T>` は共通実装を提供し、`T` は実行時には使わないマーカー型として
//! コンパイル時の型安全性だけを提供します。
//!
//! Identifiers are also used to build artifact file names, so construction
//! validates that the value is non-empty and carries no path separators or
//! whitespace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use super::errors::VaultError;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Clone + Send + Sync + 'static {
    /// Human-readable kind used in error messages ("page", "block").
    fn kind() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let page = PageId::parse("59833787-2cf9-4fdf-8782-e53db20768a5")?;
/// let block: BlockId = page.as_block_root();
/// // page と block は異なる型なので、混同できない
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id<T: IdMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Validate and wrap a raw identifier.
    pub fn parse(value: impl Into<String>) -> Result<Self, VaultError> {
        let value = value.into();
        let valid = !value.is_empty()
            && !value
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
        if !valid {
            return Err(VaultError::InvalidId {
                kind: T::kind(),
                value,
            });
        }
        Ok(Self::from_validated(value))
    }

    fn from_validated(value: String) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> TryFrom<String> for Id<T> {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl<T: IdMarker> From<Id<T>> for String {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Page のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Page {}

impl IdMarker for Page {
    fn kind() -> &'static str {
        "page"
    }
}

/// Block のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Block {}

impl IdMarker for Block {
    fn kind() -> &'static str {
        "block"
    }
}

/// Identifier of a page (the unit of capture and restore).
pub type PageId = Id<Page>;

/// Identifier of a content block.
pub type BlockId = Id<Block>;

impl PageId {
    /// A page is also the root block of its own content tree.
    pub fn as_block_root(&self) -> BlockId {
        BlockId::from_validated(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn page_id_doubles_as_block_root() {
        let page = PageId::parse("59833787-2cf9-4fdf-8782-e53db20768a5").unwrap();
        let root = page.as_block_root();
        assert_eq!(root.as_str(), page.as_str());

        // let _: PageId = root; // <- does not compile
    }

    #[rstest]
    #[case("")]
    #[case("a/b")]
    #[case("..\\evil")]
    #[case("has space")]
    #[case("tab\there")]
    fn rejects_unsafe_identifiers(#[case] raw: &str) {
        let err = PageId::parse(raw).unwrap_err();
        assert!(matches!(err, VaultError::InvalidId { kind: "page", .. }));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = BlockId::parse("b1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"b1\"");

        let back: BlockId = serde_json::from_str("\"b1\"").unwrap();
        assert_eq!(back, id);
    }

    fn to_json<T: IdMarker>(id: &Id<T>) -> String {
        serde_json::to_string(id).unwrap()
    }

    #[test]
    fn any_marker_serializes() {
        assert_eq!(to_json(&PageId::parse("p1").unwrap()), "\"p1\"");
        assert_eq!(to_json(&BlockId::parse("b1").unwrap()), "\"b1\"");
    }

    #[test]
    fn deserialize_validates() {
        let result: Result<PageId, _> = serde_json::from_str("\"../etc\"");
        assert!(result.is_err());
    }
}
