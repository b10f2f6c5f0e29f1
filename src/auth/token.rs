//! Unverified session-token decoding.
//!
//! The gate reads the payload segment of the `accessToken` JWT to decide
//! where a browser navigation may go. The signature is NOT checked here:
//! this is a routing hint only, and every API call is still verified by the
//! backend, which holds the signing key. Do not use [`SessionClaims`] from
//! this module to authorize data access.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// base64url that accepts missing padding and non-canonical trailing bits,
/// matching what browsers accept from `atob`.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

const TOKEN_SEGMENTS: usize = 3;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    #[error("payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload does not match the session claim schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Account identifier as issued by the backend (numeric ids, or strings
/// from older tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Number(i64),
    Text(String),
}

/// Claims carried by the backend's access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<SubjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// `"Customer"` or `"Employee"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounttype: Option<String>,

    /// Employee role name; absent for customers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Expiry, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatarurl: Option<String>,

    #[serde(
        default,
        rename = "isStudent",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_student: Option<bool>,
}

impl SessionClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Tokens without an `exp` claim never report as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }
}

/// Decodes the payload segment of `token`, reporting why it was rejected.
pub fn try_decode_unverified(token: &str) -> Result<SessionClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != TOKEN_SEGMENTS {
        return Err(TokenError::SegmentCount(segments.len()));
    }

    let normalized = segments[1]
        .trim_end_matches('=')
        .replace('+', "-")
        .replace('/', "_");
    let bytes = LENIENT_URL_SAFE.decode(normalized)?;

    // Only a JSON object is a claim set; arrays would otherwise satisfy the
    // derived struct visitor.
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes)?;
    let claims = serde_json::from_value(serde_json::Value::Object(object))?;

    Ok(claims)
}

/// Decodes the payload segment of `token`, collapsing every failure to
/// `None` so callers treat the request as unauthenticated.
pub fn decode_unverified(token: &str) -> Option<SessionClaims> {
    match try_decode_unverified(token) {
        Ok(claims) => Some(claims),
        Err(err) => {
            tracing::debug!(error = %err, "discarding undecodable session token");
            None
        }
    }
}
