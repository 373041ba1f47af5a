//! InMemoryGateway - 開発・テスト用のリモートワークスペース
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で状態を共有
//! - cursor ベースのページネーションの再現
//! - 障害注入（fail_after）で部分失敗をテスト
//!
//! Children are stored flat, one ordered list per parent id, and served in
//! pages of `page_size` with the start offset as the cursor.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{BlockId, ContentBlock, PageId, PageRecord, Properties, VaultError};
use crate::ports::{ChildrenPage, ContentGateway};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Gateway operations, for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    GetPage,
    ListChildren,
    UpdatePageProperties,
    DeleteBlock,
    AppendChildren,
    ArchivePage,
}

#[derive(Debug)]
struct Fault {
    op: GatewayOp,
    /// Calls of `op` that still succeed before the fault fires.
    remaining_ok: usize,
    message: String,
}

#[derive(Debug, Default)]
struct GatewayState {
    pages: HashMap<String, PageRecord>,
    archived: HashSet<String>,
    /// parent id -> ordered direct children (without their own `children`)
    children: HashMap<String, Vec<ContentBlock>>,
    known_blocks: HashSet<String>,
    next_block: u64,
    faults: Vec<Fault>,
    calls: HashMap<GatewayOp, usize>,
    list_log: Vec<(String, Option<String>)>,
}

impl GatewayState {
    fn record(&mut self, op: GatewayOp) -> Result<(), VaultError> {
        *self.calls.entry(op).or_default() += 1;
        if let Some(pos) = self.faults.iter().position(|f| f.op == op) {
            let fault = &mut self.faults[pos];
            if fault.remaining_ok == 0 {
                let fault = self.faults.remove(pos);
                return Err(VaultError::RemoteUnavailable(fault.message));
            }
            fault.remaining_ok -= 1;
        }
        Ok(())
    }

    fn allocate_block_id(&mut self) -> Result<BlockId, VaultError> {
        self.next_block += 1;
        BlockId::parse(format!("blk-{}", self.next_block))
    }

    fn is_known_parent(&self, id: &str) -> bool {
        self.pages.contains_key(id) || self.known_blocks.contains(id)
    }

    /// Store `blocks` (and any nested `children`) under `parent`.
    fn insert_tree(
        &mut self,
        parent: &str,
        blocks: Vec<ContentBlock>,
        keep_ids: bool,
    ) -> Result<(), VaultError> {
        // explicit worklist, nested subtrees are pushed back as (parent, blocks)
        let mut pending = vec![(parent.to_string(), blocks)];
        while let Some((parent, blocks)) = pending.pop() {
            for mut block in blocks {
                let id = match (&block.id, keep_ids) {
                    (Some(id), true) => id.clone(),
                    _ => self.allocate_block_id()?,
                };
                let nested = block.children.take().unwrap_or_default();
                block.id = Some(id.clone());
                block.has_children = !nested.is_empty();
                self.known_blocks.insert(id.as_str().to_string());
                self.children.entry(parent.clone()).or_default().push(block);
                if !nested.is_empty() {
                    pending.push((id.as_str().to_string(), nested));
                }
            }
        }
        Ok(())
    }

    fn remove_subtree(&mut self, id: &str) {
        let mut pending = vec![id.to_string()];
        while let Some(id) = pending.pop() {
            self.known_blocks.remove(&id);
            if let Some(children) = self.children.remove(&id) {
                pending.extend(
                    children
                        .into_iter()
                        .filter_map(|child| child.id.map(|id| id.as_str().to_string())),
                );
            }
        }
    }
}

/// InMemoryGateway は開発用のリモートワークスペース
#[derive(Debug)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
    page_size: usize,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            page_size: page_size.max(1),
        }
    }

    pub async fn insert_page(&self, page: PageRecord) {
        let mut state = self.state.lock().await;
        state.pages.insert(page.id.as_str().to_string(), page);
    }

    /// Append a block tree under `parent`. Nested `children` become real
    /// subtrees; blocks keep their ids when they have one.
    pub async fn seed_children(
        &self,
        parent: &BlockId,
        blocks: Vec<ContentBlock>,
    ) -> Result<(), VaultError> {
        let mut state = self.state.lock().await;
        state.insert_tree(parent.as_str(), blocks, true)
    }

    pub async fn page(&self, page_id: &PageId) -> Option<PageRecord> {
        self.state.lock().await.pages.get(page_id.as_str()).cloned()
    }

    pub async fn is_archived(&self, page_id: &PageId) -> bool {
        self.state.lock().await.archived.contains(page_id.as_str())
    }

    /// Direct children of `parent`, in order, without nested subtrees.
    pub async fn children_of(&self, parent: &BlockId) -> Vec<ContentBlock> {
        self.state
            .lock()
            .await
            .children
            .get(parent.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub async fn call_count(&self, op: GatewayOp) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// `(block_id, cursor)` for every `list_children` call, in order.
    pub async fn list_children_log(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().await.list_log.clone()
    }

    /// Fail the next call of `op` with `RemoteUnavailable`.
    pub async fn fail_on(&self, op: GatewayOp, message: impl Into<String>) {
        self.fail_after(op, 0, message).await;
    }

    /// Let `successes` calls of `op` through, then fail one.
    pub async fn fail_after(&self, op: GatewayOp, successes: usize, message: impl Into<String>) {
        self.state.lock().await.faults.push(Fault {
            op,
            remaining_ok: successes,
            message: message.into(),
        });
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentGateway for InMemoryGateway {
    async fn get_page(&self, page_id: &PageId) -> Result<PageRecord, VaultError> {
        let mut state = self.state.lock().await;
        state.record(GatewayOp::GetPage)?;
        state
            .pages
            .get(page_id.as_str())
            .cloned()
            .ok_or_else(|| VaultError::not_found("page", page_id.as_str()))
    }

    async fn list_children(
        &self,
        block_id: &BlockId,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, VaultError> {
        let mut state = self.state.lock().await;
        state.record(GatewayOp::ListChildren)?;
        state
            .list_log
            .push((block_id.as_str().to_string(), cursor.map(str::to_string)));

        if !state.is_known_parent(block_id.as_str()) {
            return Err(VaultError::not_found("block", block_id.as_str()));
        }
        let start = match cursor {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| VaultError::RemoteUnavailable(format!("invalid cursor {raw:?}")))?,
            None => 0,
        };

        let all = state
            .children
            .get(block_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let end = (start + self.page_size).min(all.len());
        let items = all.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let has_more = end < all.len();

        Ok(ChildrenPage {
            items,
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
        })
    }

    async fn update_page_properties(
        &self,
        page_id: &PageId,
        properties: &Properties,
    ) -> Result<(), VaultError> {
        let mut state = self.state.lock().await;
        state.record(GatewayOp::UpdatePageProperties)?;
        let page = state
            .pages
            .get_mut(page_id.as_str())
            .ok_or_else(|| VaultError::not_found("page", page_id.as_str()))?;
        for (name, value) in properties {
            page.properties.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_block(&self, block_id: &BlockId) -> Result<(), VaultError> {
        let mut state = self.state.lock().await;
        state.record(GatewayOp::DeleteBlock)?;
        if !state.known_blocks.contains(block_id.as_str()) {
            return Err(VaultError::not_found("block", block_id.as_str()));
        }
        for siblings in state.children.values_mut() {
            siblings.retain(|block| block.id.as_ref() != Some(block_id));
        }
        state.remove_subtree(block_id.as_str());
        Ok(())
    }

    async fn append_children(
        &self,
        parent_id: &BlockId,
        blocks: &[ContentBlock],
    ) -> Result<(), VaultError> {
        let mut state = self.state.lock().await;
        state.record(GatewayOp::AppendChildren)?;
        if !state.is_known_parent(parent_id.as_str()) {
            return Err(VaultError::not_found("block", parent_id.as_str()));
        }
        state.insert_tree(parent_id.as_str(), blocks.to_vec(), false)
    }

    async fn archive_page(&self, page_id: &PageId) -> Result<(), VaultError> {
        let mut state = self.state.lock().await;
        state.record(GatewayOp::ArchivePage)?;
        if !state.pages.contains_key(page_id.as_str()) {
            return Err(VaultError::not_found("page", page_id.as_str()));
        }
        state.archived.insert(page_id.as_str().to_string());
        Ok(())
    }
}
