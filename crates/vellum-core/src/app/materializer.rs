//! Materializer - ブロックツリーの展開
//!
//! # 学習ポイント
//! - 再帰の代わりに明示的なワークリスト（スタック）を使う
//! - arena + index で木を組み立て、最後に所有権つきの木へ変換する
//!
//! Pagination within one parent is a linear cursor chain and stays sequential.
//! Any gateway error aborts the whole materialization; no partial tree is
//! returned.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{BlockId, ContentBlock, VaultError};
use crate::ports::ContentGateway;

/// Pending fetch: the children of `block_id`, attached under `parent`
/// (`None` for the root), with `remaining` levels of budget.
struct Frame {
    parent: Option<usize>,
    block_id: BlockId,
    remaining: usize,
}

/// Arena slot. `children` is `Some` only when the subtree was fetched.
struct Node {
    block: Option<ContentBlock>,
    children: Option<Vec<usize>>,
}

#[derive(Clone)]
pub struct Materializer {
    gateway: Arc<dyn ContentGateway>,
}

impl Materializer {
    pub fn new(gateway: Arc<dyn ContentGateway>) -> Self {
        Self { gateway }
    }

    /// Drain the children of `root` into an ordered tree, `max_depth` levels deep.
    ///
    /// `max_depth == 0` returns an empty sequence without touching the gateway.
    /// Blocks at the last level keep `has_children` but carry no `children`.
    pub async fn materialize(
        &self,
        root: &BlockId,
        max_depth: usize,
    ) -> Result<Vec<ContentBlock>, VaultError> {
        if max_depth == 0 {
            return Ok(Vec::new());
        }

        let mut arena: Vec<Node> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        let mut stack = vec![Frame {
            parent: None,
            block_id: root.clone(),
            remaining: max_depth,
        }];

        while let Some(frame) = stack.pop() {
            let items = self.fetch_all(&frame.block_id).await?;

            let mut descend = Vec::new();
            let mut siblings = Vec::with_capacity(items.len());
            for mut block in items {
                block.children = None;
                let idx = arena.len();
                let expand = block.has_children && frame.remaining > 1;
                if let Some(id) = block.id.clone().filter(|_| expand) {
                    descend.push(Frame {
                        parent: Some(idx),
                        block_id: id,
                        remaining: frame.remaining - 1,
                    });
                }
                arena.push(Node {
                    block: Some(block),
                    children: None,
                });
                siblings.push(idx);
            }

            match frame.parent {
                Some(parent) => arena[parent].children = Some(siblings),
                None => roots = siblings,
            }
            // reversed so siblings are visited in order
            stack.extend(descend.into_iter().rev());
        }

        Ok(assemble(arena, roots))
    }

    async fn fetch_all(&self, block_id: &BlockId) -> Result<Vec<ContentBlock>, VaultError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .gateway
                .list_children(block_id, cursor.as_deref())
                .await?;
            debug!(
                block_id = %block_id,
                count = page.items.len(),
                has_more = page.has_more,
                "children page fetched"
            );
            cursor = page.continuation().map(str::to_owned);
            items.extend(page.items);
            if cursor.is_none() {
                return Ok(items);
            }
        }
    }
}

/// Children always sit at higher indices than their parent, so a reverse
/// sweep finishes every subtree before its parent needs it.
fn assemble(mut arena: Vec<Node>, roots: Vec<usize>) -> Vec<ContentBlock> {
    for idx in (0..arena.len()).rev() {
        let Some(child_indices) = arena[idx].children.take() else {
            continue;
        };
        let children: Vec<ContentBlock> = child_indices
            .into_iter()
            .filter_map(|child| arena[child].block.take())
            .collect();
        if let Some(block) = arena[idx].block.as_mut() {
            block.children = Some(children);
        }
    }
    roots
        .into_iter()
        .filter_map(|idx| arena[idx].block.take())
        .collect()
}
