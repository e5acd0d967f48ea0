//! Permission (menu) tree of the current session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use opsdesk_core::NodeId;

use crate::api::ConsoleApi;

/// Message recorded when the server fails without one.
const FETCH_FAILED: &str = "failed to load the permission tree";

/// One entry of the permission tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionNode {
    #[serde(rename = "menuId")]
    pub id: NodeId,

    #[serde(rename = "menuNm", default)]
    pub label: String,

    #[serde(rename = "menuIcon", default)]
    pub icon: Option<String>,

    #[serde(rename = "menuOrd", default)]
    pub order: Option<i32>,

    #[serde(rename = "menuLev", default)]
    pub level: Option<u32>,

    #[serde(rename = "hrnMenuId", default)]
    pub parent_id: Option<NodeId>,

    #[serde(rename = "scrId", default, skip_serializing_if = "Option::is_none")]
    pub screen_id: Option<String>,

    #[serde(default)]
    pub children: Option<Vec<PermissionNode>>,
}

impl PermissionNode {
    pub fn leaf(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            label: label.into(),
            icon: None,
            order: None,
            level: None,
            parent_id: None,
            screen_id: None,
            children: None,
        }
    }

    pub fn group(
        id: impl Into<String>,
        label: impl Into<String>,
        children: Vec<PermissionNode>,
    ) -> Self {
        Self {
            children: Some(children),
            ..Self::leaf(id, label)
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn children(&self) -> &[PermissionNode] {
        self.children.as_deref().unwrap_or_default()
    }

    /// A childless node is a navigable page; the server sends `[]` for
    /// leaves as often as it omits the field.
    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }
}

/// Depth-first (pre-order) visit of every node.
pub fn walk<'a>(nodes: &'a [PermissionNode], visit: &mut dyn FnMut(&'a PermissionNode)) {
    for node in nodes {
        visit(node);
        walk(node.children(), visit);
    }
}

/// All leaves in depth-first order.
pub fn leaves(nodes: &[PermissionNode]) -> Vec<&PermissionNode> {
    let mut out = Vec::new();
    walk(nodes, &mut |node| {
        if node.is_leaf() {
            out.push(node);
        }
    });
    out
}

pub fn find<'a>(nodes: &'a [PermissionNode], id: &str) -> Option<&'a PermissionNode> {
    let mut found = None;
    walk(nodes, &mut |node| {
        if found.is_none() && node.id.as_str() == id {
            found = Some(node);
        }
    });
    found
}

#[derive(Debug, Default)]
struct TreeState {
    nodes: Vec<PermissionNode>,
    loading: bool,
    error: Option<String>,
    /// Bumped by `clear_tree`; a load started under an older generation
    /// must not write its result.
    generation: u64,
}

/// Caches the permission tree for the current session.
pub struct PermissionTreeStore {
    api: Arc<dyn ConsoleApi>,
    state: Mutex<TreeState>,
    settled: Notify,
}

impl PermissionTreeStore {
    pub fn new(api: Arc<dyn ConsoleApi>) -> Self {
        Self {
            api,
            state: Mutex::new(TreeState::default()),
            settled: Notify::new(),
        }
    }

    /// Load the tree unless a tree is cached.
    ///
    /// A caller arriving while a load is in flight sends no request of its
    /// own; it waits for that load to settle (or to be cleared).
    ///
    /// Never fails: on error the cache is emptied and [`Self::error`] holds
    /// a message; the next call retries.
    pub async fn fetch_tree(&self) {
        let started = {
            let mut state = self.state.lock().await;
            if !state.nodes.is_empty() {
                return;
            }
            if state.loading {
                // registered before the lock is released, so the wakeup
                // cannot be missed
                let settled = self.settled.notified();
                drop(state);
                settled.await;
                return;
            }
            state.loading = true;
            state.error = None;
            state.generation
        };

        let result = self.api.permission_tree().await;

        let mut state = self.state.lock().await;
        if state.generation != started {
            tracing::debug!(
                started,
                current = state.generation,
                "discarding permission tree loaded before a clear"
            );
            return;
        }
        state.loading = false;
        match result {
            Ok(nodes) => {
                tracing::info!(roots = nodes.len(), "permission tree loaded");
                state.nodes = nodes;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch permission tree");
                let message = err.user_message();
                state.error = Some(if message.is_empty() {
                    FETCH_FAILED.to_string()
                } else {
                    message
                });
                state.nodes.clear();
            }
        }
        drop(state);
        self.settled.notify_waiters();
    }

    /// Empty the cache and reset loading/error state. A load still in
    /// flight is orphaned: its result is dropped when it arrives.
    pub async fn clear_tree(&self) {
        {
            let mut state = self.state.lock().await;
            state.nodes.clear();
            state.loading = false;
            state.error = None;
            state.generation += 1;
        }
        self.settled.notify_waiters();
    }

    pub async fn nodes(&self) -> Vec<PermissionNode> {
        self.state.lock().await.nodes.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.lock().await.error.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn is_cached(&self) -> bool {
        !self.state.lock().await.nodes.is_empty()
    }
}
