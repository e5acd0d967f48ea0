//! Turns permission-tree leaves into routes, once per login session.
//!
//! The "already materialized" flag lives in a context keyed by the session
//! epoch; a new epoch makes the previous context stale and its routes are
//! dropped before the next walk.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use opsdesk_core::NodeId;

use crate::config::NavigationConfig;
use crate::pages::{PageRegistry, PageResolution};
use crate::permission_tree::{PermissionNode, walk};
use crate::router::{RouteError, RouteMeta, RouteRecord, RouteTable};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MaterializationError {
    #[error("authenticated layout route '{0}' is not registered")]
    MissingLayout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Leaf carrying the reserved group prefix.
    GroupMarker,
    NotImplemented { key: String },
    Registration(RouteError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub registered: Vec<NodeId>,
    pub skipped: Vec<(NodeId, SkipReason)>,
    /// The session was already materialized; nothing was walked.
    pub already_materialized: bool,
}

#[derive(Debug)]
struct SessionRoutes {
    epoch: u64,
    has_added_routes: bool,
    registered: Vec<String>,
}

pub struct RouteMaterializer {
    routes: Arc<Mutex<RouteTable>>,
    pages: Arc<PageRegistry>,
    layout_name: String,
    group_prefix: String,
    ctx: Mutex<Option<SessionRoutes>>,
}

impl RouteMaterializer {
    pub fn new(
        routes: Arc<Mutex<RouteTable>>,
        pages: Arc<PageRegistry>,
        navigation: &NavigationConfig,
    ) -> Self {
        Self {
            routes,
            pages,
            layout_name: navigation.layout_name.clone(),
            group_prefix: navigation.group_prefix.clone(),
            ctx: Mutex::new(None),
        }
    }

    pub async fn is_materialized(&self, epoch: u64) -> bool {
        self.ctx
            .lock()
            .await
            .as_ref()
            .is_some_and(|ctx| ctx.epoch == epoch && ctx.has_added_routes)
    }

    /// Route names registered for the current context.
    pub async fn registered(&self) -> Vec<String> {
        self.ctx
            .lock()
            .await
            .as_ref()
            .map(|ctx| ctx.registered.clone())
            .unwrap_or_default()
    }

    /// Register one route per implemented, non-group leaf of `tree`.
    pub async fn materialize(
        &self,
        tree: &[PermissionNode],
        epoch: u64,
    ) -> Result<MaterializeReport, MaterializationError> {
        let mut ctx = self.ctx.lock().await;
        let mut routes = self.routes.lock().await;

        if let Some(current) = ctx.as_ref() {
            if current.epoch == epoch && current.has_added_routes {
                return Ok(MaterializeReport {
                    already_materialized: true,
                    ..MaterializeReport::default()
                });
            }
        }
        if let Some(stale) = ctx.take() {
            unregister(&mut routes, &stale.registered);
        }

        if !routes.has_route(&self.layout_name) {
            return Err(MaterializationError::MissingLayout(self.layout_name.clone()));
        }

        let mut leaves: Vec<&PermissionNode> = Vec::new();
        walk(tree, &mut |node| {
            if node.is_leaf() {
                leaves.push(node);
            }
        });

        let mut report = MaterializeReport::default();
        let mut registered = Vec::new();
        for node in leaves {
            match self.register(&mut routes, node) {
                Ok(name) => {
                    registered.push(name);
                    report.registered.push(node.id.clone());
                }
                Err(reason) => {
                    match &reason {
                        SkipReason::GroupMarker => {}
                        SkipReason::NotImplemented { key } => {
                            tracing::info!(node = %node.id, key = %key, "page not implemented, skipping");
                        }
                        SkipReason::Registration(err) => {
                            tracing::warn!(node = %node.id, error = %err, "failed to register route");
                        }
                    }
                    report.skipped.push((node.id.clone(), reason));
                }
            }
        }

        tracing::info!(
            epoch,
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            "dynamic routes materialized"
        );
        *ctx = Some(SessionRoutes {
            epoch,
            has_added_routes: true,
            registered,
        });
        Ok(report)
    }

    fn register(&self, routes: &mut RouteTable, node: &PermissionNode) -> Result<String, SkipReason> {
        if node.id.has_prefix(&self.group_prefix) {
            return Err(SkipReason::GroupMarker);
        }
        let page = match self.pages.resolve(&node.id) {
            PageResolution::Found(page) => page,
            PageResolution::NotImplemented { key } => {
                return Err(SkipReason::NotImplemented { key });
            }
        };

        let name = node.id.to_string();
        let record = RouteRecord::new(name.clone(), format!("/{}", node.id))
            .under(self.layout_name.clone())
            .with_meta(RouteMeta::titled(node.label.clone()).with_icon(node.icon.clone()))
            .with_page(page);
        routes.add_route(record).map_err(SkipReason::Registration)?;
        Ok(name)
    }

    /// Forget the current context and drop its routes.
    pub async fn reset(&self) {
        let mut ctx = self.ctx.lock().await;
        if let Some(stale) = ctx.take() {
            let mut routes = self.routes.lock().await;
            unregister(&mut routes, &stale.registered);
            tracing::debug!(epoch = stale.epoch, removed = stale.registered.len(), "dynamic routes reset");
        }
    }
}

fn unregister(routes: &mut RouteTable, names: &[String]) {
    for name in names {
        routes.remove_route(name);
    }
}
