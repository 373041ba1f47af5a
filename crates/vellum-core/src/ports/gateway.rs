//! ContentGateway port - リモートワークスペースへのアクセス
//!
//! The gateway performs authenticated requests against the workspace's page,
//! database and block endpoints. Retry policy, if any, lives behind this
//! trait; callers in this crate never retry.
//!
//! # 実装
//! - **HttpGateway**: REST client（本番用）
//! - **InMemoryGateway**: 開発・テスト用

use async_trait::async_trait;

use crate::domain::{BlockId, ContentBlock, PageId, PageRecord, Properties, VaultError};

/// One page of a block's children.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildrenPage {
    pub items: Vec<ContentBlock>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl ChildrenPage {
    /// Cursor to request next, `None` when the chain is exhausted.
    pub fn continuation(&self) -> Option<&str> {
        if self.has_more {
            self.next_cursor.as_deref()
        } else {
            None
        }
    }
}

/// ContentGateway は page/block の読み書きを提供
///
/// # Thread Safety
/// - `Send + Sync` を要求（`Arc<dyn ContentGateway>` で共有する）
///
/// # Errors
/// - unknown identifiers fail with `VaultError::NotFound`
/// - transport, auth and rate-limit failures are `VaultError::RemoteUnavailable`
#[async_trait]
pub trait ContentGateway: Send + Sync {
    async fn get_page(&self, page_id: &PageId) -> Result<PageRecord, VaultError>;

    /// `cursor` is the `next_cursor` of the previous page, `None` for the first.
    async fn list_children(
        &self,
        block_id: &BlockId,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, VaultError>;

    async fn update_page_properties(
        &self,
        page_id: &PageId,
        properties: &Properties,
    ) -> Result<(), VaultError>;

    async fn delete_block(&self, block_id: &BlockId) -> Result<(), VaultError>;

    /// Blocks are appended in order; ids on the input are ignored and the
    /// remote side assigns new ones.
    async fn append_children(
        &self,
        parent_id: &BlockId,
        blocks: &[ContentBlock],
    ) -> Result<(), VaultError>;

    /// Logical delete.
    async fn archive_page(&self, page_id: &PageId) -> Result<(), VaultError>;
}
