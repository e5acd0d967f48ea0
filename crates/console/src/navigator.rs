//! Host-side navigation: resolve, guard, commit, record.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::gate::{GateDecision, NavigationGate};
use crate::router::{Location, RouteTable};
use crate::tabs::TabTracker;

/// Redirect hops followed before a navigation is abandoned.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("navigation to '{target}' exceeded {hops} redirects")]
    TooManyRedirects { target: String, hops: usize },
}

#[derive(Debug, Default)]
struct NavState {
    current: Option<Location>,
    history: Vec<String>,
}

pub struct Navigator {
    routes: Arc<Mutex<RouteTable>>,
    gate: Arc<NavigationGate>,
    views: Arc<Mutex<TabTracker>>,
    state: Mutex<NavState>,
}

impl Navigator {
    pub fn new(
        routes: Arc<Mutex<RouteTable>>,
        gate: Arc<NavigationGate>,
        views: Arc<Mutex<TabTracker>>,
    ) -> Self {
        Self {
            routes,
            gate,
            views,
            state: Mutex::new(NavState::default()),
        }
    }

    pub async fn push(&self, target: &str) -> Result<Location, NavigationError> {
        self.navigate(target, false).await
    }

    pub async fn replace(&self, target: &str) -> Result<Location, NavigationError> {
        self.navigate(target, true).await
    }

    pub async fn current(&self) -> Option<Location> {
        self.state.lock().await.current.clone()
    }

    /// Committed full paths, oldest first.
    pub async fn history(&self) -> Vec<String> {
        self.state.lock().await.history.clone()
    }

    async fn navigate(&self, target: &str, mut replace: bool) -> Result<Location, NavigationError> {
        let mut target = target.to_string();
        let from = self.current().await;

        for _ in 0..=MAX_REDIRECTS {
            let to = self.routes.lock().await.resolve(&target);
            if let Some(redirect) = &to.redirect {
                tracing::debug!(from = %to.full_path, to = %redirect, "route redirect");
                target = redirect.clone();
                continue;
            }

            match self.gate.before_each(&to, from.as_ref()).await {
                GateDecision::Proceed => {
                    self.commit(&to, replace).await;
                    return Ok(to);
                }
                GateDecision::Redirect {
                    target: next,
                    replace: replace_next,
                } => {
                    tracing::debug!(from = %to.full_path, to = %next, "gate redirect");
                    target = next;
                    replace |= replace_next;
                }
            }
        }

        tracing::error!(target = %target, "navigation abandoned after too many redirects");
        Err(NavigationError::TooManyRedirects {
            target,
            hops: MAX_REDIRECTS,
        })
    }

    async fn commit(&self, to: &Location, replace: bool) {
        {
            let mut state = self.state.lock().await;
            if replace && !state.history.is_empty() {
                if let Some(last) = state.history.last_mut() {
                    *last = to.full_path.clone();
                }
            } else {
                state.history.push(to.full_path.clone());
            }
            state.current = Some(to.clone());
        }
        self.views.lock().await.add_view(to);
    }
}
