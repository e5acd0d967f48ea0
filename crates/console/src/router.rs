//! Route table of the console and target resolution.
//!
//! Static routes are seeded at start-up; dynamic routes are added by the
//! route materializer once the permission tree is known.

use serde::Serialize;
use thiserror::Error;

use crate::config::NavigationConfig;
use crate::pages::PageRef;

/// Query parameter carrying the originally requested target on the login
/// page.
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteMeta {
    pub title: Option<String>,
    pub icon: Option<String>,
    /// `None` means "requires authentication".
    pub requires_auth: Option<bool>,
    pub affix: bool,
    pub hidden: bool,
    pub no_cache: bool,
}

impl RouteMeta {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth.unwrap_or(true)
    }

    pub fn public(mut self) -> Self {
        self.requires_auth = Some(false);
        self
    }

    pub fn pinned(mut self) -> Self {
        self.affix = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }

    /// Title if present and not blank.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub name: String,
    /// Absolute path, e.g. `/FW1101`.
    pub path: String,
    pub parent: Option<String>,
    pub redirect: Option<String>,
    pub meta: RouteMeta,
    pub page: Option<PageRef>,
}

impl RouteRecord {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: normalize_path(&path.into()),
            parent: None,
            redirect: None,
            meta: RouteMeta::default(),
            page: None,
        }
    }

    pub fn under(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }

    pub fn with_meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_page(mut self, page: PageRef) -> Self {
        self.page = Some(page);
        self
    }
}

/// A resolved navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    /// Path plus query string; the navigation target.
    pub full_path: String,
    pub query: Vec<(String, String)>,
    /// Name of the matched route, if any.
    pub name: Option<String>,
    pub meta: RouteMeta,
    /// Names of matched records, outermost layout first. Empty when the
    /// target does not match any registered route.
    pub matched: Vec<String>,
    /// Route-level redirect of the matched record.
    pub redirect: Option<String>,
}

impl Location {
    pub fn is_matched(&self) -> bool {
        !self.matched.is_empty()
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route name '{0}' is already registered")]
    DuplicateName(String),

    #[error("route path '{0}' is already registered")]
    DuplicatePath(String),

    #[error("route '{route}' refers to unknown parent '{parent}'")]
    UnknownParent { route: String, parent: String },
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    records: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(records: impl IntoIterator<Item = RouteRecord>) -> Result<Self, RouteError> {
        let mut table = Self::new();
        for record in records {
            table.add_route(record)?;
        }
        Ok(table)
    }

    pub fn add_route(&mut self, record: RouteRecord) -> Result<(), RouteError> {
        if self.has_route(&record.name) {
            return Err(RouteError::DuplicateName(record.name));
        }
        if self.records.iter().any(|r| r.path == record.path) {
            return Err(RouteError::DuplicatePath(record.path));
        }
        if let Some(parent) = &record.parent {
            if !self.has_route(parent) {
                return Err(RouteError::UnknownParent {
                    route: record.name,
                    parent: parent.clone(),
                });
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn remove_route(&mut self, name: &str) -> Option<RouteRecord> {
        let index = self.records.iter().position(|r| r.name == name)?;
        Some(self.records.remove(index))
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&RouteRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn records(&self) -> &[RouteRecord] {
        &self.records
    }

    /// Resolve a target such as `/FW1101?tab=2`.
    pub fn resolve(&self, target: &str) -> Location {
        let (path, query) = split_target(target);
        let full_path = join_query(&path, &query);

        let Some(record) = self.records.iter().find(|r| r.path == path) else {
            return Location {
                path,
                full_path,
                query,
                name: None,
                meta: RouteMeta::default(),
                matched: Vec::new(),
                redirect: None,
            };
        };

        Location {
            path,
            full_path,
            query,
            name: Some(record.name.clone()),
            meta: record.meta.clone(),
            matched: self.ancestry(record),
            redirect: record.redirect.clone(),
        }
    }

    fn ancestry(&self, record: &RouteRecord) -> Vec<String> {
        let mut chain = vec![record.name.clone()];
        let mut parent = record.parent.as_deref();
        while let Some(name) = parent {
            let Some(up) = self.get(name) else { break };
            // removing a parent and re-adding it below its own child loops
            if chain.contains(&up.name) {
                tracing::warn!(route = %record.name, parent = %up.name, "route parent chain loops");
                break;
            }
            chain.push(up.name.clone());
            parent = up.parent.as_deref();
        }
        chain.reverse();
        chain
    }
}

/// Static routes of the console shell.
pub fn static_routes(nav: &NavigationConfig) -> Vec<RouteRecord> {
    vec![
        RouteRecord::new("Login", nav.login_path.clone())
            .with_meta(RouteMeta::titled("Login").public().hidden()),
        RouteRecord::new(nav.layout_name.clone(), "/").redirect_to(nav.home_path.clone()),
        RouteRecord::new(nav.home_name.clone(), nav.home_path.clone())
            .under(nav.layout_name.clone())
            .with_meta(RouteMeta::titled("Dashboard").pinned()),
        RouteRecord::new("MenuManagement", "/menus")
            .under(nav.layout_name.clone())
            .with_meta(RouteMeta::titled("Menu Management")),
        RouteRecord::new("Sample", "/sample")
            .under(nav.layout_name.clone())
            .with_meta(RouteMeta::titled("Sample Page")),
    ]
}

/// Leading slash, no trailing slash (except the root), no fragment.
pub fn normalize_path(path: &str) -> String {
    let path = path.split('#').next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Split a target into normalized path and decoded query pairs.
pub fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    let target = target.split('#').next().unwrap_or_default();
    match target.split_once('?') {
        Some((path, query)) => {
            let pairs = url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            (normalize_path(path), pairs)
        }
        None => (normalize_path(target), Vec::new()),
    }
}

/// `path?k=v&...`, percent-encoding the pairs.
pub fn join_query(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    format!("{path}?{encoded}")
}

/// Login target replaying `original` after authentication.
pub fn login_with_redirect(login_path: &str, original: &str) -> String {
    join_query(
        login_path,
        &[(REDIRECT_PARAM.to_string(), original.to_string())],
    )
}
