//! Authorization policy

use serde::{Deserialize, Serialize};

/// How contacts of related objects count towards visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationKind {
    /// Services: host contacts see all services of the host.
    /// Groups: visible when any member is visible.
    Loose,
    /// Services: only service contacts.
    /// Groups: visible when all members are visible.
    Strict,
}

impl std::fmt::Display for AuthorizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationKind::Loose => write!(f, "loose"),
            AuthorizationKind::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationPolicy {
    pub service_authorization: AuthorizationKind,
    pub group_authorization: AuthorizationKind,
    /// Contacts that see every object
    pub see_all: Vec<String>,
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self {
            service_authorization: AuthorizationKind::Loose,
            group_authorization: AuthorizationKind::Strict,
            see_all: Vec::new(),
        }
    }
}

impl AuthorizationPolicy {
    pub fn sees_all(&self, contact_name: &str) -> bool {
        self.see_all.iter().any(|name| name == contact_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_toml() {
        let policy: AuthorizationPolicy = toml::from_str(
            "service_authorization = \"strict\"\nsee_all = [\"admin\"]\n",
        )
        .unwrap();
        assert_eq!(policy.service_authorization, AuthorizationKind::Strict);
        assert_eq!(policy.group_authorization, AuthorizationKind::Strict);
        assert!(policy.sees_all("admin"));
        assert!(!policy.sees_all("alice"));
    }
}
