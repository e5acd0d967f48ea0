use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use opsdesk_core::{DeptCode, TenantCode, UserId};

use crate::{Authority, Role};

/// Identity of the logged-in user, as returned by the "who am I" endpoint.
///
/// Field names follow the server payload. Authorities keep the server's
/// order; duplicates are dropped on construction and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "empId")]
    pub user_id: UserId,

    #[serde(rename = "empNm")]
    pub display_name: String,

    #[serde(rename = "cmpCd")]
    pub tenant: TenantCode,

    #[serde(rename = "deptCd")]
    pub department: DeptCode,

    #[serde(default, deserialize_with = "ordered_authorities")]
    authorities: Vec<Authority>,

    #[serde(rename = "deptNm", default, skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,

    #[serde(rename = "cmpNm", default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("principal payload has no user id")]
    MissingUserId,
}

impl Principal {
    pub fn new(
        user_id: UserId,
        display_name: impl Into<String>,
        tenant: TenantCode,
        department: DeptCode,
        authorities: impl IntoIterator<Item = Authority>,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            tenant,
            department,
            authorities: dedup(authorities),
            department_name: None,
            tenant_name: None,
            mail: None,
        }
    }

    /// Reject payloads that cannot identify a user.
    pub fn validate(&self) -> Result<(), PrincipalError> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(PrincipalError::MissingUserId);
        }
        Ok(())
    }

    pub fn authorities(&self) -> &[Authority] {
        &self.authorities
    }

    /// Raw membership check against the authority set.
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a.as_str() == authority)
    }

    /// Role check; `ADMIN` and `ROLE_ADMIN` are equivalent.
    pub fn has_role(&self, role: &Role) -> bool {
        self.has_authority(role.canonical().as_str())
    }
}

fn dedup(authorities: impl IntoIterator<Item = Authority>) -> Vec<Authority> {
    let mut seen = HashSet::new();
    authorities
        .into_iter()
        .filter(|a| seen.insert(a.as_str().to_string()))
        .collect()
}

fn ordered_authorities<'de, D>(deserializer: D) -> Result<Vec<Authority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Authority>>::deserialize(deserializer)?;
    Ok(dedup(raw.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Principal {
        Principal::new(
            UserId::new("E001"),
            "Kim",
            TenantCode::new("C01"),
            DeptCode::new("D10"),
            [
                Authority::new("ROLE_USER"),
                Authority::new("MENU_READ"),
                Authority::new("ROLE_USER"),
            ],
        )
    }

    #[test]
    fn duplicates_are_dropped_in_order() {
        let p = sample();
        let names: Vec<&str> = p.authorities().iter().map(|a| a.as_str()).collect();
        assert_eq!(names, vec!["ROLE_USER", "MENU_READ"]);
    }

    #[test]
    fn role_check_normalizes_prefix() {
        let p = sample();
        assert!(p.has_role(&Role::new("USER")));
        assert!(p.has_role(&Role::new("ROLE_USER")));
        assert!(!p.has_role(&Role::new("ADMIN")));
        // MENU_READ is an authority, not a role
        assert!(!p.has_role(&Role::new("MENU_READ")));
        assert!(p.has_authority("MENU_READ"));
    }

    #[test]
    fn deserializes_server_payload() {
        let json = r#"{
            "cmpCd": "C01",
            "empId": "E001",
            "empNm": "Kim",
            "deptCd": "D10",
            "deptNm": "Finance",
            "authorities": [{"authority": "ROLE_ADMIN"}, "ROLE_ADMIN", "ROLE_USER"],
            "jobclsCd": "J1"
        }"#;
        let p: Principal = serde_json::from_str(json).unwrap();
        assert_eq!(p.user_id.as_str(), "E001");
        assert_eq!(p.department_name.as_deref(), Some("Finance"));
        assert_eq!(p.authorities().len(), 2);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn missing_authorities_is_empty_set() {
        let json = r#"{"cmpCd":"C01","empId":"E001","empNm":"Kim","deptCd":"D10","authorities":null}"#;
        let p: Principal = serde_json::from_str(json).unwrap();
        assert!(p.authorities().is_empty());
    }

    #[test]
    fn blank_user_id_fails_validation() {
        let mut p = sample();
        p.user_id = UserId::new("  ");
        assert_eq!(p.validate(), Err(PrincipalError::MissingUserId));
    }
}
