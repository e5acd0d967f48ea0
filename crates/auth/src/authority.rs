use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};

/// A granted authority string, e.g. `ROLE_ADMIN` or `MENU_READ`.
///
/// Authorities are opaque at this layer; no hierarchy or wildcard is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Authority(Cow<'static, str>);

impl Authority {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Authority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Servers emit authorities either as bare strings or as
/// `{ "authority": "..." }` objects (the granted-authority shape).
#[derive(Deserialize)]
#[serde(untagged)]
enum AuthorityRepr {
    Bare(String),
    Granted { authority: String },
}

impl<'de> Deserialize<'de> for Authority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = match AuthorityRepr::deserialize(deserializer)? {
            AuthorityRepr::Bare(name) => name,
            AuthorityRepr::Granted { authority } => authority,
        };
        Ok(Self::new(name))
    }
}
