use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::SessionClaims;

/// Account type the backend issues to self-registered customers.
pub const CUSTOMER_ACCOUNT_TYPE: &str = "Customer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    Customer,
    Employee,
    HrManager,
    WhManager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Guest,
        Role::Customer,
        Role::Employee,
        Role::HrManager,
        Role::WhManager,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Customer => "customer",
            Role::Employee => "employee",
            Role::HrManager => "hr_manager",
            Role::WhManager => "wh_manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// The role a request is evaluated as.
///
/// Tokens may name roles the gate has no table entry for; those are kept
/// verbatim so they can be logged, and are granted nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EffectiveRole {
    Known(Role),
    Unrecognized(String),
}

impl EffectiveRole {
    pub fn known(&self) -> Option<Role> {
        match self {
            EffectiveRole::Known(role) => Some(*role),
            EffectiveRole::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EffectiveRole::Known(role) => role.as_str(),
            EffectiveRole::Unrecognized(name) => name,
        }
    }
}

impl From<Role> for EffectiveRole {
    fn from(role: Role) -> Self {
        EffectiveRole::Known(role)
    }
}

impl fmt::Display for EffectiveRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps decoded claims to the role used for routing.
///
/// Customers are identified by account type alone; everyone else carries a
/// `role` claim, and an absent or empty one means guest.
pub fn resolve_role(claims: Option<&SessionClaims>) -> EffectiveRole {
    let Some(claims) = claims else {
        return Role::Guest.into();
    };

    if claims.accounttype.as_deref() == Some(CUSTOMER_ACCOUNT_TYPE) {
        return Role::Customer.into();
    }

    match claims.role.as_deref() {
        None | Some("") => Role::Guest.into(),
        Some(name) => name
            .parse::<Role>()
            .map(EffectiveRole::Known)
            .unwrap_or_else(|_| EffectiveRole::Unrecognized(name.to_string())),
    }
}
