//! Page implementations supplied by the presentation layer.
//!
//! A permission node finds its page under `<prefix><seg>/<id>` where `seg` is
//! the first two characters of the id, lowercased.

use std::collections::HashMap;
use std::sync::Arc;

use opsdesk_core::NodeId;

/// Handle to a page implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub key: String,
    pub component: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResolution {
    Found(PageRef),
    /// The tree references a page nobody has built yet.
    NotImplemented { key: String },
}

/// Lookup key of the page backing `id`.
pub fn page_key(id: &NodeId, prefix: &str) -> String {
    format!("{prefix}{}/{}", id.directory_segment(), id.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct PageRegistry {
    prefix: String,
    pages: HashMap<String, Arc<str>>,
}

impl PageRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            pages: HashMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register a component under an explicit key.
    pub fn register(&mut self, key: impl Into<String>, component: impl Into<Arc<str>>) {
        self.pages.insert(key.into(), component.into());
    }

    /// Register the page of a permission node.
    pub fn register_node(&mut self, id: &NodeId, component: impl Into<Arc<str>>) -> String {
        let key = page_key(id, &self.prefix);
        self.register(key.clone(), component);
        key
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pages.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn resolve(&self, id: &NodeId) -> PageResolution {
        let key = page_key(id, &self.prefix);
        match self.pages.get(&key) {
            Some(component) => PageResolution::Found(PageRef {
                key,
                component: component.clone(),
            }),
            None => PageResolution::NotImplemented { key },
        }
    }
}
