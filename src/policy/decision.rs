use chrono::Utc;

use super::{is_sub_path, matches_prefix, RoutePolicy};
use crate::auth::{decode_unverified, resolve_role, EffectiveRole};

/// Outcome of evaluating one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through. `role` is `None` for public pages, which are
    /// served without looking at the token.
    Allow { role: Option<EffectiveRole> },

    /// No usable session; send the browser to the sign-in page.
    SignIn { location: String },

    /// Signed in, but the role may not open this page.
    RoleDefault {
        role: EffectiveRole,
        location: String,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// Redirect target, for denied requests.
    pub fn location(&self) -> Option<&str> {
        match self {
            Decision::Allow { .. } => None,
            Decision::SignIn { location } | Decision::RoleDefault { location, .. } => {
                Some(location)
            }
        }
    }
}

/// Decides where a navigation to `path` may go given the raw session token.
///
/// Stateless and free of I/O: the same policy, path and token always give
/// the same decision. Missing, malformed and undecodable tokens are all
/// treated as "not signed in". The token's `exp` claim is not enforced here;
/// the backend rejects expired tokens on every API call.
pub fn authorize(policy: &RoutePolicy, path: &str, token: Option<&str>) -> Decision {
    if policy.is_public(path) {
        return Decision::Allow { role: None };
    }

    let Some(token) = token.filter(|token| !token.is_empty()) else {
        return Decision::SignIn {
            location: policy.signin_location(path),
        };
    };

    let Some(claims) = decode_unverified(token) else {
        return Decision::SignIn {
            location: policy.signin_location(path),
        };
    };

    if claims.is_expired_at(Utc::now()) {
        tracing::debug!(path, exp = ?claims.exp, "routing with a session token past its exp claim");
    }

    let role = resolve_role(Some(&claims));

    if policy.is_common(path) || role_permits(policy, &role, path) {
        return Decision::Allow { role: Some(role) };
    }

    let location = policy.default_redirect(&role).to_string();
    Decision::RoleDefault { role, location }
}

fn role_permits(policy: &RoutePolicy, role: &EffectiveRole, path: &str) -> bool {
    if policy
        .section_grants(role)
        .iter()
        .any(|section| is_sub_path(path, section))
    {
        return true;
    }

    policy.allowed_prefixes(role).iter().any(|prefix| {
        if !matches_prefix(path, prefix) {
            return false;
        }
        if !is_sub_path(path, prefix) {
            return true;
        }
        // Nested pages inside a reserved section only count for its owner.
        match policy.reserved_owner(path) {
            Some(owner) => role.known() == Some(owner),
            None => true,
        }
    })
}
