//! Route permission table.
//!
//! [`RoutePolicy`] is plain data: which paths are public, which any signed-in
//! account may reach, which prefixes each role may reach and where a role is
//! sent when it strays. It is built once at startup (the built-in table or a
//! JSON file) and shared read-only; [`decision::authorize`] evaluates requests
//! against it.

pub mod decision;
pub mod matcher;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{EffectiveRole, Role};
pub use decision::{authorize, Decision};
pub use matcher::{is_sub_path, matches_prefix, normalize_path, RequestMatcher};

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to read route policy {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid route policy: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("role {0} has no route entry and therefore no default redirect")]
    MissingRole(Role),

    #[error("route {0:?} must be an absolute path")]
    RelativePath(String),

    #[error("sign-in path {0} is not a public route")]
    SigninNotPublic(String),
}

/// Prefixes a role may open and the page it lands on when denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRoutes {
    pub allowed: Vec<String>,
    pub default_redirect: String,
}

/// A section whose nested pages belong to one role, even if another role's
/// allowed prefix happens to cover it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedSection {
    pub prefix: String,
    pub owner: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    pub public_routes: Vec<String>,

    /// Reachable by every authenticated role.
    #[serde(default)]
    pub common_routes: Vec<String>,

    pub roles: BTreeMap<Role, RoleRoutes>,

    /// Sections whose every sub-page a role may open, independent of its
    /// allowed prefixes.
    #[serde(default)]
    pub section_grants: BTreeMap<Role, Vec<String>>,

    #[serde(default)]
    pub reserved_sections: Vec<ReservedSection>,

    /// Landing page for roles without an entry.
    pub fallback_redirect: String,

    pub signin_path: String,

    /// Query parameter carrying the originally requested path to the sign-in
    /// page; `None` sends a bare redirect.
    #[serde(default)]
    pub callback_param: Option<String>,

    #[serde(default)]
    pub excluded: RequestMatcher,
}

impl RoutePolicy {
    /// The facility's route table, following the navigation menu of each
    /// role.
    pub fn standard() -> Self {
        fn paths(items: &[&str]) -> Vec<String> {
            items.iter().map(|item| item.to_string()).collect()
        }

        let roles = BTreeMap::from([
            (
                Role::Guest,
                RoleRoutes {
                    allowed: paths(&["/booking", "/products", "/rentals"]),
                    default_redirect: "/booking".to_string(),
                },
            ),
            (
                Role::Customer,
                RoleRoutes {
                    allowed: paths(&["/booking", "/products", "/rentals"]),
                    default_redirect: "/booking".to_string(),
                },
            ),
            (
                Role::Employee,
                RoleRoutes {
                    allowed: paths(&["/booking", "/booking-detail", "/assignments", "/enrollments"]),
                    default_redirect: "/booking".to_string(),
                },
            ),
            (
                Role::HrManager,
                RoleRoutes {
                    allowed: paths(&["/employees", "/approvals", "/assignments", "/fingerprint"]),
                    default_redirect: "/employees".to_string(),
                },
            ),
            (
                Role::WhManager,
                RoleRoutes {
                    allowed: paths(&[
                        "/assignments",
                        "/price-management",
                        "/price-management/court-price",
                        "/price-management/rental-price",
                        "/warehouse",
                        "/warehouse/zone-court",
                        "/warehouse/accessories",
                        "/warehouse/suppliers",
                        "/warehouse/orders",
                    ]),
                    default_redirect: "/price-management".to_string(),
                },
            ),
            (
                Role::Admin,
                RoleRoutes {
                    allowed: paths(&["/admin/dashboard", "/admin/prediction"]),
                    default_redirect: "/admin/dashboard".to_string(),
                },
            ),
        ]);

        Self {
            public_routes: paths(&[
                "/",
                "/signin",
                "/signup",
                "/forgot-password",
                "/reset-password",
                "/contact",
                "/terms",
                "/privacy-policy",
                "/faq",
                "/products",
                "/rentals",
            ]),
            common_routes: paths(&["/profile"]),
            roles,
            section_grants: BTreeMap::from([(
                Role::WhManager,
                paths(&["/price-management", "/warehouse"]),
            )]),
            reserved_sections: vec![ReservedSection {
                prefix: "/admin".to_string(),
                owner: Role::Admin,
            }],
            fallback_redirect: "/".to_string(),
            signin_path: "/signin".to_string(),
            callback_param: Some("callbackUrl".to_string()),
            excluded: RequestMatcher::standard(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, PolicyError> {
        let policy: RoutePolicy = serde_json::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Checks the table invariants: every role has a default redirect, every
    /// route is absolute and the sign-in page is reachable without a token.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Some(role) = Role::ALL
            .into_iter()
            .find(|role| !self.roles.contains_key(role))
        {
            return Err(PolicyError::MissingRole(role));
        }

        let routes = self
            .public_routes
            .iter()
            .chain(&self.common_routes)
            .chain(self.roles.values().flat_map(|entry| {
                entry
                    .allowed
                    .iter()
                    .chain(std::iter::once(&entry.default_redirect))
            }))
            .chain(self.section_grants.values().flatten())
            .chain(self.reserved_sections.iter().map(|section| &section.prefix))
            .chain([&self.fallback_redirect, &self.signin_path]);

        for route in routes {
            if !route.starts_with('/') {
                return Err(PolicyError::RelativePath(route.clone()));
            }
        }

        if !self.is_public(&self.signin_path) {
            return Err(PolicyError::SigninNotPublic(self.signin_path.clone()));
        }

        Ok(())
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes
            .iter()
            .any(|route| matches_prefix(path, route))
    }

    pub fn is_common(&self, path: &str) -> bool {
        self.common_routes
            .iter()
            .any(|route| matches_prefix(path, route))
    }

    pub fn allowed_prefixes(&self, role: &EffectiveRole) -> &[String] {
        role.known()
            .and_then(|role| self.roles.get(&role))
            .map(|entry| entry.allowed.as_slice())
            .unwrap_or_default()
    }

    pub fn section_grants(&self, role: &EffectiveRole) -> &[String] {
        role.known()
            .and_then(|role| self.section_grants.get(&role))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The owner of the reserved section containing `path`, if any.
    pub fn reserved_owner(&self, path: &str) -> Option<Role> {
        self.reserved_sections
            .iter()
            .find(|section| is_sub_path(path, &section.prefix))
            .map(|section| section.owner)
    }

    pub fn default_redirect(&self, role: &EffectiveRole) -> &str {
        role.known()
            .and_then(|role| self.roles.get(&role))
            .map(|entry| entry.default_redirect.as_str())
            .unwrap_or(self.fallback_redirect.as_str())
    }

    /// Sign-in URL, carrying `requested` as the callback target when enabled.
    pub fn signin_location(&self, requested: &str) -> String {
        match &self.callback_param {
            Some(param) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair(param, requested)
                    .finish();
                format!("{}?{}", self.signin_path, query)
            }
            None => self.signin_path.clone(),
        }
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::standard()
    }
}
