//! `opsdesk-core`: identifiers and error model shared by the console crates.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod error;
pub mod id;

pub use error::{CoreError, CoreResult};
pub use id::{DeptCode, NodeId, TenantCode, UserId};
