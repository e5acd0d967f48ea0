//! Guard evaluated before every navigation.
//!
//! Phases run strictly in order for one attempt: lazy session verification,
//! lazy route materialization, access decision. Every failure ends in a
//! redirect; the gate itself never errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::NavigationConfig;
use crate::materializer::RouteMaterializer;
use crate::permission_tree::PermissionTreeStore;
use crate::router::{Location, login_with_redirect};
use crate::session::SessionStore;

/// Root path; it always redirects and is never treated as unknown.
const ROOT_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Redirect { target: String, replace: bool },
}

impl GateDecision {
    fn redirect(target: impl Into<String>) -> Self {
        Self::Redirect {
            target: target.into(),
            replace: false,
        }
    }

    fn replay(target: impl Into<String>) -> Self {
        Self::Redirect {
            target: target.into(),
            replace: true,
        }
    }
}

pub struct NavigationGate {
    session: Arc<SessionStore>,
    tree: Arc<PermissionTreeStore>,
    materializer: Arc<RouteMaterializer>,
    login_path: String,
    home_path: String,
    /// Lazy verification runs at most once per page lifetime.
    initial_check_done: AtomicBool,
}

impl NavigationGate {
    pub fn new(
        session: Arc<SessionStore>,
        tree: Arc<PermissionTreeStore>,
        materializer: Arc<RouteMaterializer>,
        navigation: &NavigationConfig,
    ) -> Self {
        Self {
            session,
            tree,
            materializer,
            login_path: navigation.login_path.clone(),
            home_path: navigation.home_path.clone(),
            initial_check_done: AtomicBool::new(false),
        }
    }

    pub fn initial_check_done(&self) -> bool {
        self.initial_check_done.load(Ordering::SeqCst)
    }

    pub async fn before_each(&self, to: &Location, from: Option<&Location>) -> GateDecision {
        tracing::debug!(
            to = %to.full_path,
            from = from.map(|f| f.full_path.as_str()).unwrap_or(""),
            "navigation requested"
        );

        self.verify_once().await;

        if let Some(decision) = self.materialize_routes(to).await {
            return decision;
        }

        self.decide(to).await
    }

    async fn verify_once(&self) {
        if self.initial_check_done.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.session.is_logged_in().await || self.session.is_verifying().await {
            return;
        }
        if !self.session.has_session_flag().await {
            return;
        }
        let authenticated = self.session.check_session_status().await;
        tracing::info!(authenticated, "initial session check finished");
    }

    async fn materialize_routes(&self, to: &Location) -> Option<GateDecision> {
        if !self.session.is_logged_in().await {
            return None;
        }
        let epoch = self.session.epoch().await;
        if self.materializer.is_materialized(epoch).await {
            return None;
        }

        self.tree.fetch_tree().await;
        if self.session.epoch().await != epoch {
            tracing::debug!(to = %to.full_path, "session changed while the tree loaded");
            return Some(GateDecision::replay(to.full_path.clone()));
        }

        let outcome = match self.tree.error().await {
            Some(message) => Err(message),
            None => {
                let nodes = self.tree.nodes().await;
                self.materializer
                    .materialize(&nodes, epoch)
                    .await
                    .map_err(|err| err.to_string())
            }
        };

        match outcome {
            Ok(_) => Some(GateDecision::replay(to.full_path.clone())),
            Err(reason) => {
                tracing::warn!(reason = %reason, to = %to.full_path, "route materialization failed");
                self.materializer.reset().await;
                let login = self.session.discard_local().await;
                Some(GateDecision::replay(login))
            }
        }
    }

    async fn decide(&self, to: &Location) -> GateDecision {
        let authenticated = self.session.is_logged_in().await;

        if to.meta.requires_auth() && !authenticated {
            self.tree.clear_tree().await;
            self.materializer.reset().await;
            return GateDecision::redirect(login_with_redirect(&self.login_path, &to.full_path));
        }
        if to.path == self.login_path && authenticated {
            return GateDecision::redirect(self.home_path.clone());
        }
        if !to.is_matched() && to.path != ROOT_PATH {
            return GateDecision::redirect(self.home_path.clone());
        }
        GateDecision::Proceed
    }
}
