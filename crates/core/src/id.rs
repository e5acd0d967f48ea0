//! Strongly-typed identifiers used across the console.
//!
//! All identifiers are server-issued opaque strings (employee ids, company
//! codes, menu ids). They are never generated on the client.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifier of the logged-in user (employee id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Tenant / company code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantCode(String);

/// Department code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeptCode(String);

/// Identifier of a permission (menu) node, e.g. `FW1101`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw value without validation.
            ///
            /// Wire payloads go through serde and are taken as-is; use
            /// `FromStr` for user input.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = CoreError;

            fn from_str(s: &str) -> CoreResult<Self> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(CoreError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

impl_string_newtype!(UserId, "UserId");
impl_string_newtype!(TenantCode, "TenantCode");
impl_string_newtype!(DeptCode, "DeptCode");
impl_string_newtype!(NodeId, "NodeId");

impl NodeId {
    /// Whether this id carries the given group-marker prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(prefix)
    }

    /// Two-character directory segment used to locate the node's page.
    ///
    /// Case-folded; ids shorter than two characters yield what they have.
    pub fn directory_segment(&self) -> String {
        self.0.chars().take(2).collect::<String>().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank_ids() {
        assert!("".parse::<UserId>().is_err());
        assert!("   ".parse::<NodeId>().is_err());
        assert_eq!("  E001 ".parse::<UserId>().unwrap().as_str(), "E001");
    }

    #[test]
    fn directory_segment_is_lowercased_prefix() {
        assert_eq!(NodeId::new("FW1101").directory_segment(), "fw");
        assert_eq!(NodeId::new("x").directory_segment(), "x");
    }

    #[test]
    fn group_prefix_match() {
        let id = NodeId::new("GRP_SYS");
        assert!(id.has_prefix("GRP"));
        assert!(!id.has_prefix(""));
        assert!(!NodeId::new("FW1101").has_prefix("GRP"));
    }

    #[test]
    fn serde_is_transparent() {
        let id: NodeId = serde_json::from_str("\"FW1101\"").unwrap();
        assert_eq!(id, NodeId::new("FW1101"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"FW1101\"");
    }
}
