//! Session store: owns the authenticated principal.
//!
//! `Anonymous -> Verifying -> Authenticated`, back to `Anonymous` on logout
//! or failed verification. Every public action catches API errors and
//! reports a plain boolean; nothing here returns an error to the caller.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, Notify};

use opsdesk_auth::{Principal, Role};

use crate::api::{ConsoleApi, Credentials};
use crate::permission_tree::PermissionTreeStore;
use crate::persistence::SessionPersistence;
use crate::tabs::TabTracker;

/// Shown when nobody is logged in.
pub const GUEST_NAME: &str = "Guest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Anonymous,
    Verifying,
    Authenticated,
}

#[derive(Debug, Default)]
struct SessionState {
    principal: Option<Principal>,
    verifying: bool,
    /// Bumped whenever a principal is installed, when a login starts and
    /// when the session ends.
    epoch: u64,
    last_error: Option<String>,
}

pub struct SessionStore {
    api: Arc<dyn ConsoleApi>,
    persistence: Arc<dyn SessionPersistence>,
    tree: Arc<PermissionTreeStore>,
    views: Arc<Mutex<TabTracker>>,
    login_path: String,
    state: Mutex<SessionState>,
    /// Woken whenever `verifying` drops back to false.
    settled: Notify,
}

impl SessionStore {
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        persistence: Arc<dyn SessionPersistence>,
        tree: Arc<PermissionTreeStore>,
        views: Arc<Mutex<TabTracker>>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            api,
            persistence,
            tree,
            views,
            login_path: login_path.into(),
            state: Mutex::new(SessionState::default()),
            settled: Notify::new(),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.lock().await;
        if state.principal.is_some() {
            SessionStatus::Authenticated
        } else if state.verifying {
            SessionStatus::Verifying
        } else {
            SessionStatus::Anonymous
        }
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.lock().await.principal.is_some()
    }

    pub async fn is_verifying(&self) -> bool {
        self.state.lock().await.verifying
    }

    pub async fn principal(&self) -> Option<Principal> {
        self.state.lock().await.principal.clone()
    }

    /// Identifies the current login session.
    pub async fn epoch(&self) -> u64 {
        self.state.lock().await.epoch
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    /// Display name, or [`GUEST_NAME`].
    pub async fn username(&self) -> String {
        self.state
            .lock()
            .await
            .principal
            .as_ref()
            .map(|p| p.display_name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(GUEST_NAME)
            .to_string()
    }

    /// `ADMIN` and `ROLE_ADMIN` are equivalent.
    pub async fn has_role(&self, role: &str) -> bool {
        let role = Role::new(role.to_string());
        self.state
            .lock()
            .await
            .principal
            .as_ref()
            .is_some_and(|p| p.has_role(&role))
    }

    pub async fn has_authority(&self, authority: &str) -> bool {
        self.state
            .lock()
            .await
            .principal
            .as_ref()
            .is_some_and(|p| p.has_authority(authority))
    }

    /// Whether a previous login left evidence of a server session.
    pub async fn has_session_flag(&self) -> bool {
        match self.persistence.has_session_flag().await {
            Ok(flag) => flag,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read session flag");
                false
            }
        }
    }

    /// Reinstall the principal persisted by a previous run.
    pub async fn restore(&self) -> bool {
        let persisted = match self.persistence.load_principal().await {
            Ok(principal) => principal,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load persisted principal");
                return false;
            }
        };
        let Some(principal) = persisted.filter(|p| p.validate().is_ok()) else {
            return false;
        };

        let mut state = self.state.lock().await;
        if state.principal.is_some() {
            return true;
        }
        tracing::info!(user = %principal.user_id, "restored persisted principal");
        state.principal = Some(principal);
        state.epoch += 1;
        true
    }

    /// Ask the server who is logged in.
    ///
    /// No-op while a principal is held or a check is in flight. A stale
    /// answer (logout happened meanwhile) is discarded.
    pub async fn check_session_status(&self) -> bool {
        let started_epoch = {
            let mut state = self.state.lock().await;
            if state.principal.is_some() {
                return true;
            }
            if state.verifying {
                return false;
            }
            state.verifying = true;
            state.epoch
        };

        let result = self.api.who_am_i().await;

        let failure = match result {
            Ok(Some(principal)) => match principal.validate() {
                Ok(()) => {
                    return self.install(principal, started_epoch).await;
                }
                Err(err) => err.to_string(),
            },
            Ok(None) => "session check returned no user".to_string(),
            Err(err) => {
                tracing::info!(error = %err, "user is not authenticated or session expired");
                err.user_message()
            }
        };

        let stale = {
            let mut state = self.state.lock().await;
            state.verifying = false;
            if state.epoch != started_epoch {
                tracing::debug!("discarding stale session check failure");
                Some(state.principal.is_some())
            } else {
                state.last_error = Some(failure);
                None
            }
        };
        self.settled.notify_waiters();
        if let Some(held) = stale {
            return held;
        }
        self.logout().await;
        false
    }

    async fn install(&self, principal: Principal, started_epoch: u64) -> bool {
        let stale = {
            let mut state = self.state.lock().await;
            state.verifying = false;
            if state.epoch != started_epoch {
                tracing::debug!("discarding stale session check");
                Some(state.principal.is_some())
            } else {
                tracing::info!(user = %principal.user_id, "session verified");
                state.principal = Some(principal.clone());
                state.epoch += 1;
                state.last_error = None;
                None
            }
        };
        self.settled.notify_waiters();
        if let Some(held) = stale {
            return held;
        }

        if let Err(err) = self.persistence.save_principal(Some(&principal)).await {
            tracing::warn!(error = %err, "failed to persist principal");
        }
        if let Err(err) = self.persistence.set_session_flag(true).await {
            tracing::warn!(error = %err, "failed to persist session flag");
        }

        self.tree.fetch_tree().await;
        true
    }

    /// Form login followed by a session check.
    ///
    /// A check already in flight belongs to the state before this login:
    /// its answer is discarded and the login waits for it to settle before
    /// running its own.
    pub async fn login(&self, credentials: &Credentials) -> bool {
        let switching = {
            let mut state = self.state.lock().await;
            state.last_error = None;
            state.epoch += 1;
            state.principal.take().is_some()
        };
        if switching {
            self.tree.clear_tree().await;
        }

        if let Err(err) = self.api.login(credentials).await {
            tracing::warn!(user = %credentials.user_id, error = %err, "login rejected");
            self.state.lock().await.last_error = Some(err.user_message());
            return false;
        }

        if let Err(err) = self.persistence.set_session_flag(true).await {
            tracing::warn!(error = %err, "failed to persist session flag");
        }
        self.wait_for_check().await;
        self.check_session_status().await
    }

    async fn wait_for_check(&self) {
        let state = self.state.lock().await;
        if !state.verifying {
            return;
        }
        let settled = self.settled.notified();
        drop(state);
        settled.await;
    }

    /// Drop the session locally and on the server; returns the login path.
    pub async fn logout(&self) -> String {
        self.end_locally("logging out").await;

        if let Err(err) = self.persistence.set_session_flag(false).await {
            tracing::warn!(error = %err, "failed to clear session flag");
        }
        if let Err(err) = self.persistence.save_principal(None).await {
            tracing::warn!(error = %err, "failed to clear persisted principal");
        }
        self.tree.clear_tree().await;
        self.views.lock().await.clear_views();

        if let Err(err) = self.api.logout().await {
            tracing::warn!(error = %err, "server logout failed");
        }
        self.login_path.clone()
    }

    /// Forget the principal in this process only. The server session and
    /// the persisted markers survive, so a later start can restore them.
    /// Returns the login path.
    pub async fn discard_local(&self) -> String {
        self.end_locally("discarding local session").await;
        self.tree.clear_tree().await;
        self.views.lock().await.clear_views();
        self.login_path.clone()
    }

    async fn end_locally(&self, reason: &'static str) {
        {
            let mut state = self.state.lock().await;
            if let Some(principal) = state.principal.take() {
                tracing::info!(user = %principal.user_id, "{}", reason);
            }
            state.verifying = false;
            state.epoch += 1;
        }
        self.settled.notify_waiters();
    }
}
