//! Open tabs ("visited views") and the set of views kept warm.
//!
//! Pure bookkeeping driven by committed navigations. A tab is identified by
//! its `path`; revisiting a path with a different query updates the existing
//! tab in place.

use serde::Serialize;

use crate::router::{Location, RouteRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    pub name: Option<String>,
    pub path: String,
    pub full_path: String,
    pub query: Vec<(String, String)>,
    pub title: String,
    pub affix: bool,
    pub no_cache: bool,
    pub hidden: bool,
}

impl TabView {
    /// Tab for a resolved location; `None` when the location cannot become a
    /// tab (hidden, unnamed or untitled).
    pub fn from_location(location: &Location) -> Option<Self> {
        if location.meta.hidden {
            return None;
        }
        let name = location.name.clone()?;
        let title = location.meta.display_title()?.to_string();
        Some(Self {
            name: Some(name),
            path: location.path.clone(),
            full_path: location.full_path.clone(),
            query: location.query.clone(),
            title,
            affix: location.meta.affix,
            no_cache: location.meta.no_cache,
            hidden: false,
        })
    }

    fn from_record(record: &RouteRecord) -> Option<Self> {
        if record.meta.hidden {
            return None;
        }
        let title = record.meta.display_title()?.to_string();
        Some(Self {
            name: Some(record.name.clone()),
            path: record.path.clone(),
            full_path: record.path.clone(),
            query: Vec::new(),
            title,
            affix: record.meta.affix,
            no_cache: record.meta.no_cache,
            hidden: false,
        })
    }

    fn cache_name(&self) -> Option<&str> {
        if self.no_cache {
            return None;
        }
        self.name.as_deref()
    }
}

/// Visited and cached views after a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewsSnapshot {
    pub visited: Vec<TabView>,
    pub cached: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TabTracker {
    home_path: String,
    home_name: String,
    visited: Vec<TabView>,
    cached: Vec<String>,
}

impl TabTracker {
    pub fn new(home_path: impl Into<String>, home_name: impl Into<String>) -> Self {
        Self {
            home_path: home_path.into(),
            home_name: home_name.into(),
            visited: Vec::new(),
            cached: Vec::new(),
        }
    }

    pub fn visited_views(&self) -> &[TabView] {
        &self.visited
    }

    pub fn cached_views(&self) -> &[String] {
        &self.cached
    }

    pub fn affix_views(&self) -> Vec<TabView> {
        self.visited.iter().filter(|v| v.affix).cloned().collect()
    }

    pub fn snapshot(&self) -> ViewsSnapshot {
        ViewsSnapshot {
            visited: self.visited.clone(),
            cached: self.cached.clone(),
        }
    }

    pub fn is_dashboard(&self, view: &TabView) -> bool {
        view.path == self.home_path || view.name.as_deref() == Some(self.home_name.as_str())
    }

    pub fn is_affix(&self, view: &TabView) -> bool {
        view.affix
    }

    pub fn is_tab_closable(&self, view: &TabView) -> bool {
        !self.is_dashboard(view) && !self.is_affix(view)
    }

    /// Record a committed navigation.
    pub fn add_view(&mut self, location: &Location) {
        let Some(view) = TabView::from_location(location) else {
            return;
        };
        self.add_cached_view(&view);
        self.add_visited_view(view);
    }

    pub fn add_visited_view(&mut self, view: TabView) {
        if view.hidden || view.title.trim().is_empty() {
            return;
        }
        match self.visited.iter_mut().find(|v| v.path == view.path) {
            Some(existing) => *existing = view,
            None => self.visited.push(view),
        }
    }

    pub fn add_cached_view(&mut self, view: &TabView) {
        let Some(name) = view.cache_name() else {
            return;
        };
        if !self.cached.iter().any(|c| c == name) {
            self.cached.push(name.to_string());
        }
    }

    /// Close a tab. Pinned and home tabs are never closed.
    pub fn del_view(&mut self, view: &TabView) -> ViewsSnapshot {
        if self.is_tab_closable(view) {
            self.del_visited_view(view);
            self.del_cached_view(view);
        }
        self.snapshot()
    }

    pub fn del_visited_view(&mut self, view: &TabView) -> ViewsSnapshot {
        if self.is_tab_closable(view) {
            self.visited.retain(|v| v.path != view.path);
        }
        self.snapshot()
    }

    pub fn del_cached_view(&mut self, view: &TabView) -> ViewsSnapshot {
        if let Some(name) = view.name.as_deref() {
            self.cached.retain(|c| c != name);
        }
        self.snapshot()
    }

    /// Keep pinned tabs and `view`.
    pub fn del_others_views(&mut self, view: &TabView) -> ViewsSnapshot {
        self.visited.retain(|v| v.affix || v.path == view.path);
        self.recompute_cache();
        self.snapshot()
    }

    /// Keep pinned tabs only.
    pub fn del_all_views(&mut self) -> ViewsSnapshot {
        self.visited.retain(|v| v.affix);
        self.recompute_cache();
        self.snapshot()
    }

    /// Logout variant of [`Self::del_all_views`].
    pub fn clear_views(&mut self) {
        let remaining = self.del_all_views();
        tracing::debug!(pinned = remaining.visited.len(), "views cleared");
    }

    /// Refresh an open tab in place; returns whether a tab matched.
    pub fn update_visited_view(&mut self, view: &TabView) -> bool {
        match self.visited.iter_mut().find(|v| v.path == view.path) {
            Some(existing) => {
                *existing = view.clone();
                true
            }
            None => false,
        }
    }

    /// Where to go after closing `closed`.
    ///
    /// Latest remaining tab, else the first pinned tab, else home unless
    /// `current_path` is home already.
    pub fn to_last_view(&self, closed: Option<&TabView>, current_path: &str) -> Option<String> {
        let not_closed = |v: &&TabView| closed.is_none_or(|c| c.path != v.path);

        if let Some(latest) = self.visited.iter().rev().find(not_closed) {
            return Some(latest.full_path.clone());
        }
        if let Some(pinned) = self.visited.iter().filter(|v| v.affix).find(not_closed) {
            return Some(pinned.full_path.clone());
        }
        (current_path != self.home_path).then(|| self.home_path.clone())
    }

    /// Seed pinned tabs from route configuration, in configuration order.
    pub fn init_affix_tags(&mut self, routes: &[RouteRecord]) {
        for view in routes
            .iter()
            .filter(|r| r.meta.affix)
            .filter_map(TabView::from_record)
        {
            self.add_cached_view(&view);
            self.add_visited_view(view);
        }
    }

    fn recompute_cache(&mut self) {
        let mut cached: Vec<String> = Vec::new();
        for name in self.visited.iter().filter_map(TabView::cache_name) {
            if !cached.iter().any(|c| c == name) {
                cached.push(name.to_string());
            }
        }
        self.cached = cached;
    }
}
