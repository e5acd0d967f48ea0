//! Server API consumed by the stores.
//!
//! Stores depend on the [`ConsoleApi`] trait rather than on the transport so
//! that the state machines can be driven without a server.

use async_trait::async_trait;

use opsdesk_auth::Principal;

use crate::config::{ConsoleConfig, Endpoints};
use crate::permission_tree::PermissionNode;
use crate::transport::{ApiError, ApiRequest, Transport};

/// Login form fields.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant: String,
    pub user_id: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        tenant: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            user_id: user_id.into(),
            password: password.into(),
        }
    }

    /// Form fields as the login endpoint expects them; blank fields are
    /// left out.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        [
            ("cmpCd", &self.tenant),
            ("empId", &self.user_id),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k, v.clone()))
        .collect()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant", &self.tenant)
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .finish()
    }
}

#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// Have the server issue the anti-forgery cookie.
    async fn bootstrap_csrf(&self) -> Result<(), ApiError>;

    /// Form login; any 2xx–3xx is success.
    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    /// Current principal; `None` when the server answered without data.
    async fn who_am_i(&self) -> Result<Option<Principal>, ApiError>;

    /// Permission tree of the current principal.
    async fn permission_tree(&self) -> Result<Vec<PermissionNode>, ApiError>;
}

/// [`ConsoleApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConsoleApi {
    transport: Transport,
    endpoints: Endpoints,
}

impl HttpConsoleApi {
    pub fn new(transport: Transport, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self, ApiError> {
        Ok(Self::new(Transport::new(config)?, config.endpoints.clone()))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

#[async_trait]
impl ConsoleApi for HttpConsoleApi {
    async fn bootstrap_csrf(&self) -> Result<(), ApiError> {
        self.transport.bootstrap_csrf().await
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let request = ApiRequest::post(self.endpoints.login.clone())
            .form(credentials.form_fields())
            .raw();
        let response = self.transport.raw(&request).await?;
        tracing::debug!(status = response.status, user = %credentials.user_id, "login accepted");
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let request = ApiRequest::post(self.endpoints.logout.clone()).raw();
        self.transport.raw(&request).await.map(|_| ())
    }

    async fn who_am_i(&self) -> Result<Option<Principal>, ApiError> {
        let request = ApiRequest::get(self.endpoints.who_am_i.clone());
        self.transport.enveloped(&request).await
    }

    async fn permission_tree(&self) -> Result<Vec<PermissionNode>, ApiError> {
        let request = ApiRequest::get(self.endpoints.permission_tree.clone());
        let nodes: Option<Vec<PermissionNode>> = self.transport.enveloped(&request).await?;
        Ok(nodes.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_skip_blanks() {
        let creds = Credentials::new("", "E001", "secret");
        assert_eq!(
            creds.form_fields(),
            vec![("empId", "E001".to_string()), ("password", "secret".to_string())]
        );
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("C01", "E001", "secret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("E001"));
        assert!(!printed.contains("secret"));
    }
}
