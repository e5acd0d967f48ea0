//! `opsdesk-console`
//!
//! **Responsibility:** client-side control plane of the admin console.
//!
//! This crate provides:
//! - An HTTP transport that recovers once from anti-forgery token expiry
//! - The session store and the permission tree store
//! - Route materialization from the permission tree, once per session
//! - The navigation gate and a navigator driving it
//! - Tab/view bookkeeping for the multi-document desk
//!
//! Rendering is not part of this crate; the presentation layer supplies a
//! [`PageRegistry`] and drives navigation through [`Console`].

pub mod api;
pub mod config;
pub mod console;
pub mod gate;
pub mod materializer;
pub mod navigator;
pub mod pages;
pub mod permission_tree;
pub mod persistence;
pub mod router;
pub mod session;
pub mod tabs;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{ConsoleApi, Credentials, HttpConsoleApi};
pub use config::{ConfigError, ConsoleConfig, Endpoints, NavigationConfig};
pub use console::Console;
pub use gate::{GateDecision, NavigationGate};
pub use materializer::{MaterializationError, MaterializeReport, RouteMaterializer, SkipReason};
pub use navigator::{NavigationError, Navigator};
pub use pages::{PageRef, PageRegistry, PageResolution};
pub use permission_tree::{PermissionNode, PermissionTreeStore};
pub use persistence::{MemoryPersistence, SessionPersistence, SqlitePersistence};
pub use router::{Location, RouteError, RouteMeta, RouteRecord, RouteTable};
pub use session::{SessionStatus, SessionStore};
pub use tabs::{TabTracker, TabView, ViewsSnapshot};
pub use transport::{ApiError, ApiRequest, Reply, ResponseShape, Transport};
