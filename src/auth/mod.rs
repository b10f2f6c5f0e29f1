//! Session identity as seen by the gate: the unverified token payload and
//! the role derived from it.

pub mod role;
pub mod token;

pub use role::{resolve_role, EffectiveRole, Role};
pub use token::{decode_unverified, SessionClaims};

/// Cookie holding the backend-issued access token.
pub const SESSION_COOKIE: &str = "accessToken";
