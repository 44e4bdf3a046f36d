//! Caller roles carried in the bearer token

use serde::{Deserialize, Serialize};

/// Kind of account behind a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    SuperAdmin,
    Client,
    Staff,
}

impl UserType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "super_admin" => Some(UserType::SuperAdmin),
            "client" => Some(UserType::Client),
            "staff" => Some(UserType::Staff),
            _ => None,
        }
    }
}

/// Store role, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Supervisor,
    Manager,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "staff" => Some(Role::Staff),
            "supervisor" => Some(Role::Supervisor),
            "manager" => Some(Role::Manager),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Supervisor => "supervisor",
            Role::Manager => "manager",
        }
    }
}

/// Role check: super admins pass, otherwise the caller's role must be at least `required`.
/// Unknown roles never pass.
pub fn role_satisfies(user_type: UserType, role: Option<Role>, required: Role) -> bool {
    if user_type == UserType::SuperAdmin {
        return true;
    }
    role.map(|r| r >= required).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(role_satisfies(UserType::Client, Some(Role::Manager), Role::Supervisor));
        assert!(role_satisfies(UserType::Client, Some(Role::Manager), Role::Manager));
        assert!(!role_satisfies(UserType::Staff, Some(Role::Staff), Role::Manager));
        assert!(!role_satisfies(UserType::Client, None, Role::Staff));
    }

    #[test]
    fn test_super_admin_bypasses() {
        assert!(role_satisfies(UserType::SuperAdmin, None, Role::Manager));
    }
}
