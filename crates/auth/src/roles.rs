use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Authority;

/// Prefix that turns a role name into its canonical authority form.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Role identifier as callers write it (`ADMIN` or `ROLE_ADMIN`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical authority for this role: bare names gain [`ROLE_PREFIX`],
    /// already-prefixed names are kept.
    pub fn canonical(&self) -> Authority {
        if self.0.starts_with(ROLE_PREFIX) {
            Authority::new(self.0.to_string())
        } else {
            Authority::new(format!("{ROLE_PREFIX}{}", self.0))
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}
