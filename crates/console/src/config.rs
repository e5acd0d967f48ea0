//! Console configuration.
//!
//! Defaults match the stock backend; every value can be overridden from the
//! environment by the binary (see [`ConsoleConfig::from_env`]).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const ENV_API_URL: &str = "OPSDESK_API_URL";
pub const ENV_TIMEOUT_MS: &str = "OPSDESK_TIMEOUT_MS";
pub const ENV_DATA_DIR: &str = "OPSDESK_DATA_DIR";

const DEFAULT_API_URL: &str = "http://localhost:9001";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Server endpoints consumed by the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub csrf: String,
    pub login: String,
    pub logout: String,
    pub who_am_i: String,
    pub permission_tree: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            csrf: "/api/user/csrf".to_string(),
            login: "/api/user/login".to_string(),
            logout: "/api/user/logout".to_string(),
            who_am_i: "/api/user/me".to_string(),
            permission_tree: "/api/menus".to_string(),
        }
    }
}

/// Client-side navigation conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Login entry point.
    pub login_path: String,
    /// Default landing page.
    pub home_path: String,
    /// Route name of the landing page.
    pub home_name: String,
    /// Name of the authenticated layout dynamic routes hang under.
    pub layout_name: String,
    /// Permission node ids with this prefix are groups, never routes.
    pub group_prefix: String,
    /// Prefix of the page lookup key (`<prefix><seg>/<id>`).
    pub page_prefix: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
            home_name: "Dashboard".to_string(),
            layout_name: "Layout".to_string(),
            group_prefix: "GRP".to_string(),
            page_prefix: "views/".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub endpoints: Endpoints,
    pub navigation: NavigationConfig,
    /// Where persisted session state lives; `None` uses the OS data dir.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API url '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid timeout '{0}': expected milliseconds")]
    InvalidTimeout(String),
}

impl ConsoleConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|source| ConfigError::InvalidUrl {
            value: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            endpoints: Endpoints::default(),
            navigation: NavigationConfig::default(),
            data_dir: None,
        })
    }

    /// Build from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&api_url)?;

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config.timeout = Duration::from_millis(ms);
        }

        config.data_dir = lookup(ENV_DATA_DIR).map(PathBuf::from);
        Ok(config)
    }

    /// Absolute URL of a server path.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default API url is valid"),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            endpoints: Endpoints::default(),
            navigation: NavigationConfig::default(),
            data_dir: None,
        }
    }
}
