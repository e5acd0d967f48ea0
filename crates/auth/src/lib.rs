//! `opsdesk-auth`: the authenticated principal and its authority predicates.
//!
//! This crate is intentionally decoupled from HTTP and storage: the session
//! store in `opsdesk-console` owns the lifecycle, this crate only answers
//! "who is this" and "may they".

pub mod authority;
pub mod principal;
pub mod roles;

pub use authority::Authority;
pub use principal::{Principal, PrincipalError};
pub use roles::{ROLE_PREFIX, Role};
