//! Scripted [`ConsoleApi`] for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use opsdesk_auth::{Authority, Principal};
use opsdesk_core::{DeptCode, TenantCode, UserId};

use crate::api::{ConsoleApi, Credentials};
use crate::permission_tree::PermissionNode;
use crate::transport::ApiError;

pub(crate) fn principal(user: &str) -> Principal {
    Principal::new(
        UserId::new(user),
        format!("User {user}"),
        TenantCode::new("C01"),
        DeptCode::new("D10"),
        [Authority::new("ROLE_USER")],
    )
}

#[derive(Default)]
struct Script {
    principal: Option<Principal>,
    who_am_i_error: Option<ApiError>,
    tree: Vec<PermissionNode>,
    tree_error: Option<ApiError>,
    login_error: Option<ApiError>,
    logout_error: Option<ApiError>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    script: Mutex<Script>,
    csrf_calls: AtomicUsize,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    who_am_i_calls: AtomicUsize,
    tree_calls: AtomicUsize,
    who_am_i_hold: Mutex<Option<Arc<Notify>>>,
    tree_hold: Mutex<Option<Arc<Notify>>>,
}

/// Parks the next call until the returned handle is notified.
fn arm(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let release = Arc::new(Notify::new());
    *slot.lock().unwrap() = Some(release.clone());
    release
}

async fn park(slot: &Mutex<Option<Arc<Notify>>>) {
    let hold = slot.lock().unwrap().take();
    if let Some(release) = hold {
        release.notified().await;
    }
}

/// Yield until `done` holds; the other side of a `tokio::join!` makes
/// progress meanwhile.
pub(crate) async fn until(done: impl Fn() -> bool) {
    while !done() {
        tokio::task::yield_now().await;
    }
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Server session already exists for `principal`.
    pub(crate) fn with_principal(self, principal: Principal) -> Self {
        self.script.lock().unwrap().principal = Some(principal);
        self
    }

    pub(crate) fn with_tree(self, tree: Vec<PermissionNode>) -> Self {
        self.script.lock().unwrap().tree = tree;
        self
    }

    pub(crate) fn fail_who_am_i_with(&self, err: ApiError) {
        self.script.lock().unwrap().who_am_i_error = Some(err);
    }

    pub(crate) fn fail_tree_with(&self, err: ApiError) {
        self.script.lock().unwrap().tree_error = Some(err);
    }

    pub(crate) fn clear_tree_failure(&self) {
        self.script.lock().unwrap().tree_error = None;
    }

    pub(crate) fn fail_login_with(&self, err: ApiError) {
        self.script.lock().unwrap().login_error = Some(err);
    }

    pub(crate) fn fail_logout_with(&self, err: ApiError) {
        self.script.lock().unwrap().logout_error = Some(err);
    }

    /// The next `who_am_i` waits for the returned handle.
    pub(crate) fn hold_who_am_i(&self) -> Arc<Notify> {
        arm(&self.who_am_i_hold)
    }

    /// The next `permission_tree` waits for the returned handle.
    pub(crate) fn hold_tree(&self) -> Arc<Notify> {
        arm(&self.tree_hold)
    }

    pub(crate) fn csrf_calls(&self) -> usize {
        self.csrf_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn who_am_i_calls(&self) -> usize {
        self.who_am_i_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn tree_calls(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsoleApi for FakeApi {
    async fn bootstrap_csrf(&self) -> Result<(), ApiError> {
        self.csrf_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.login_error.clone() {
            return Err(err);
        }
        script.principal = Some(principal(&credentials.user_id));
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let mut script = self.script.lock().unwrap();
        script.principal = None;
        match script.logout_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn who_am_i(&self) -> Result<Option<Principal>, ApiError> {
        self.who_am_i_calls.fetch_add(1, Ordering::SeqCst);
        park(&self.who_am_i_hold).await;
        tokio::task::yield_now().await;
        let script = self.script.lock().unwrap();
        if let Some(err) = script.who_am_i_error.clone() {
            return Err(err);
        }
        match &script.principal {
            Some(p) => Ok(Some(p.clone())),
            None => Err(ApiError::Auth {
                status: 401,
                code: Some("AUTH-001".to_string()),
                message: "authentication required".to_string(),
            }),
        }
    }

    async fn permission_tree(&self) -> Result<Vec<PermissionNode>, ApiError> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        park(&self.tree_hold).await;
        tokio::task::yield_now().await;
        let script = self.script.lock().unwrap();
        if let Some(err) = script.tree_error.clone() {
            return Err(err);
        }
        Ok(script.tree.clone())
    }
}
