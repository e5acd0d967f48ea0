//! One page lifetime of the console: every store, the route table, the gate
//! and the navigator, wired together.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use opsdesk_auth::Principal;

use crate::api::{ConsoleApi, Credentials, HttpConsoleApi};
use crate::config::ConsoleConfig;
use crate::gate::NavigationGate;
use crate::materializer::RouteMaterializer;
use crate::navigator::{NavigationError, Navigator};
use crate::pages::PageRegistry;
use crate::permission_tree::PermissionTreeStore;
use crate::persistence::{SessionPersistence, SqlitePersistence};
use crate::router::{Location, REDIRECT_PARAM, RouteError, RouteTable, static_routes};
use crate::session::SessionStore;
use crate::tabs::{TabTracker, TabView, ViewsSnapshot};

pub struct Console {
    config: ConsoleConfig,
    api: Arc<dyn ConsoleApi>,
    session: Arc<SessionStore>,
    tree: Arc<PermissionTreeStore>,
    routes: Arc<Mutex<RouteTable>>,
    materializer: Arc<RouteMaterializer>,
    views: Arc<Mutex<TabTracker>>,
    navigator: Navigator,
}

impl Console {
    pub fn new(
        config: ConsoleConfig,
        api: Arc<dyn ConsoleApi>,
        persistence: Arc<dyn SessionPersistence>,
        pages: PageRegistry,
    ) -> Result<Self, RouteError> {
        let nav = config.navigation.clone();

        let routes = Arc::new(Mutex::new(RouteTable::with_routes(static_routes(&nav))?));
        let views = Arc::new(Mutex::new(TabTracker::new(
            nav.home_path.clone(),
            nav.home_name.clone(),
        )));
        let tree = Arc::new(PermissionTreeStore::new(api.clone()));
        let session = Arc::new(SessionStore::new(
            api.clone(),
            persistence,
            tree.clone(),
            views.clone(),
            nav.login_path.clone(),
        ));
        let materializer = Arc::new(RouteMaterializer::new(routes.clone(), Arc::new(pages), &nav));
        let gate = Arc::new(NavigationGate::new(
            session.clone(),
            tree.clone(),
            materializer.clone(),
            &nav,
        ));
        let navigator = Navigator::new(routes.clone(), gate, views.clone());

        Ok(Self {
            config,
            api,
            session,
            tree,
            routes,
            materializer,
            views,
            navigator,
        })
    }

    /// HTTP API plus SQLite persistence in the configured data directory.
    pub async fn connect(config: ConsoleConfig, pages: PageRegistry) -> anyhow::Result<Self> {
        let api = HttpConsoleApi::from_config(&config).context("failed to build HTTP client")?;
        let persistence = SqlitePersistence::open_default(config.data_dir.as_deref()).await?;
        tracing::info!(base_url = %config.base_url, "console connected");
        Ok(Self::new(config, Arc::new(api), Arc::new(persistence), pages)?)
    }

    /// Bootstrap the anti-forgery token, restore a persisted principal and
    /// seed pinned tabs.
    pub async fn start(&self) {
        if let Err(err) = self.api.bootstrap_csrf().await {
            tracing::error!(error = %err, "anti-forgery token bootstrap failed");
        }
        let restored = self.session.restore().await;

        let records = self.routes.lock().await.records().to_vec();
        self.views.lock().await.init_affix_tags(&records);
        tracing::info!(restored, "console started");
    }

    /// Log in and continue to the target the login page was asked to replay,
    /// or home. `None` when the credentials were rejected.
    pub async fn login(&self, credentials: &Credentials) -> Result<Option<Location>, NavigationError> {
        if !self.session.login(credentials).await {
            return Ok(None);
        }
        let target = self
            .navigator
            .current()
            .await
            .and_then(|loc| loc.query_value(REDIRECT_PARAM).map(str::to_string))
            .unwrap_or_else(|| self.config.navigation.home_path.clone());
        self.navigator.push(&target).await.map(Some)
    }

    pub async fn logout(&self) -> Result<Location, NavigationError> {
        let target = self.session.logout().await;
        self.materializer.reset().await;
        self.navigator.replace(&target).await
    }

    pub async fn navigate(&self, target: &str) -> Result<Location, NavigationError> {
        self.navigator.push(target).await
    }

    /// Close a tab; when it was the current page, move to the last view.
    pub async fn close_view(&self, view: &TabView) -> Result<ViewsSnapshot, NavigationError> {
        let current = self.navigator.current().await;
        let (snapshot, next) = {
            let mut views = self.views.lock().await;
            if !views.is_tab_closable(view) {
                return Ok(views.snapshot());
            }
            let snapshot = views.del_view(view);
            let next = match current {
                Some(loc) if loc.path == view.path => views.to_last_view(Some(view), &loc.path),
                _ => None,
            };
            (snapshot, next)
        };

        if let Some(target) = next {
            self.navigator.push(&target).await?;
        }
        Ok(snapshot)
    }

    pub async fn views(&self) -> ViewsSnapshot {
        self.views.lock().await.snapshot()
    }

    pub async fn current(&self) -> Option<Location> {
        self.navigator.current().await
    }

    pub async fn principal(&self) -> Option<Principal> {
        self.session.principal().await
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn permission_tree(&self) -> &PermissionTreeStore {
        &self.tree
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub async fn has_route(&self, name: &str) -> bool {
        self.routes.lock().await.has_route(name)
    }
}
