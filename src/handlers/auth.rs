use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{decode_unverified, SessionClaims, SESSION_COOKIE};
use crate::error::AppError;
use crate::handlers::proxy::backend_api_url;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
    pub data: Option<Value>,
}

impl ApiMessage {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: Option<SessionClaims>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SigninResult {
    access_token: String,
}

/// Exchanges credentials with the backend and stores the access token in
/// an HttpOnly cookie. Cookies the backend sets itself (the refresh token)
/// are passed through.
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(credentials): Json<Value>,
) -> Result<Response, AppError> {
    let upstream = state
        .http
        .post(backend_api_url(&state.config.backend_url, "/auth/signin"))
        .json(&credentials)
        .send()
        .await?;

    if !upstream.status().is_success() {
        tracing::info!(status = %upstream.status(), "backend rejected sign-in");
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(ApiMessage::new("Invalid credentials")),
        )
            .into_response());
    }

    let forwarded: Vec<(header::HeaderName, HeaderValue)> = upstream
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| (header::SET_COOKIE, value.clone()))
        .collect();

    let SigninResult { access_token } = upstream.json().await.map_err(|err| {
        tracing::error!(error = %err, "sign-in response carried no access token");
        AppError::Internal("malformed sign-in response".to_string())
    })?;

    let cookie = Cookie::build((SESSION_COOKIE, access_token))
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Strict)
        .path("/");

    Ok((
        AppendHeaders(forwarded),
        jar.add(cookie),
        Json(ApiMessage::new("Signed in")),
    )
        .into_response())
}

pub async fn signout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(ApiMessage::new("Signed out")),
    )
}

/// Reports the claims of the current session cookie without verifying them.
pub async fn session(jar: CookieJar) -> (StatusCode, Json<SessionResponse>) {
    match jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| decode_unverified(cookie.value()))
    {
        Some(claims) => (StatusCode::OK, Json(SessionResponse { user: Some(claims) })),
        None => (StatusCode::UNAUTHORIZED, Json(SessionResponse { user: None })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::tests::token_for;
    use axum::http::HeaderMap;
    use serde_json::json;

    fn jar_with(token: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).unwrap(),
        );
        CookieJar::from_headers(&headers)
    }

    #[tokio::test]
    async fn session_returns_decoded_claims() {
        let token = token_for(&json!({"sub": 7, "username": "lan", "role": "employee"}));

        let (status, Json(body)) = session(jar_with(&token)).await;

        assert_eq!(status, StatusCode::OK);
        let user = body.user.unwrap();
        assert_eq!(user.username.as_deref(), Some("lan"));
        assert_eq!(user.role.as_deref(), Some("employee"));
    }

    #[tokio::test]
    async fn session_without_cookie_is_unauthorized() {
        let (status, Json(body)) = session(CookieJar::new()).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.user.is_none());
    }

    #[tokio::test]
    async fn session_with_garbage_cookie_is_unauthorized() {
        let (status, Json(body)) = session(jar_with("not-a-token")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.user.is_none());
    }

    #[tokio::test]
    async fn signout_expires_cookie() {
        let response = signout(jar_with("a.b.c")).await.into_response();

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("accessToken="));
        assert!(set_cookie.contains("Max-Age=0"));
    }
}
