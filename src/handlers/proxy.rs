//! Passthrough to the upstreams.
//!
//! `/api/...` goes to the backend's `/api/v1/...` with the session cookie
//! turned into a bearer credential; every other allowed path goes to the
//! frontend origin under the normalised path the route guard decided on.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{EffectiveRole, SESSION_COOKIE};
use crate::error::AppError;
use crate::policy::{matches_prefix, normalize_path};
use crate::AppState;

pub(crate) const MAX_PROXY_BODY: usize = 16 * 1024 * 1024;

/// Role the gate resolved for a page request, passed on to the frontend.
pub static SESSION_ROLE_HEADER: HeaderName = HeaderName::from_static("x-session-role");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upstream {
    Backend,
    Frontend,
}

pub(crate) fn backend_api_url(backend_url: &str, path: &str) -> String {
    format!("{}/api/v1{}", backend_url.trim_end_matches('/'), path)
}

pub async fn forward_api(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
) -> Result<Response, AppError> {
    let path = normalize_path(req.uri().path())
        .filter(|path| matches_prefix(path, "/api"))
        .ok_or_else(|| AppError::BadRequest("invalid API path".to_string()))?;
    let mut target = backend_api_url(
        &state.config.backend_url,
        path.strip_prefix("/api").unwrap_or_default(),
    );
    if let Some(query) = req.uri().query() {
        target.push('?');
        target.push_str(query);
    }

    let mut headers = forwardable_headers(req.headers(), Upstream::Backend);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", cookie.value()))
            .map_err(|_| AppError::BadRequest("malformed session cookie".to_string()))?;
        headers.insert(header::AUTHORIZATION, bearer);
    }
    if let Some(cookies) = backend_cookie_header(&jar) {
        headers.insert(header::COOKIE, cookies);
    }

    relay(&state, target, headers, req).await
}

pub async fn forward_page(State(state): State<AppState>, req: Request) -> Result<Response, AppError> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!(
        "{}{}",
        state.config.frontend_url.trim_end_matches('/'),
        path_and_query
    );

    let mut headers = forwardable_headers(req.headers(), Upstream::Frontend);
    if let Some(role) = req.extensions().get::<EffectiveRole>() {
        if let Ok(value) = HeaderValue::from_str(role.as_str()) {
            headers.insert(SESSION_ROLE_HEADER.clone(), value);
        }
    }

    relay(&state, target, headers, req).await
}

async fn relay(
    state: &AppState,
    target: String,
    headers: HeaderMap,
    req: Request,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, MAX_PROXY_BODY)
        .await
        .map_err(|err| AppError::BadRequest(format!("failed to read request body: {err}")))?;

    tracing::debug!(method = %parts.method, target = %target, "proxying request");

    let upstream = state
        .http
        .request(parts.method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|err| {
            tracing::warn!(target = %target, error = %err, "upstream request failed");
            AppError::Upstream(err)
        })?;

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let bytes = upstream.bytes().await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    for (name, value) in upstream_headers.iter() {
        if !is_hop_by_hop(name) && name != header::CONTENT_LENGTH {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }

    Ok(response)
}

/// Every cookie except the session token, which travels as the bearer
/// credential instead. The backend reads `refreshToken` from here.
fn backend_cookie_header(jar: &CookieJar) -> Option<HeaderValue> {
    let cookies: Vec<String> = jar
        .iter()
        .filter(|cookie| cookie.name() != SESSION_COOKIE)
        .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
        .collect();

    if cookies.is_empty() {
        return None;
    }
    HeaderValue::from_str(&cookies.join("; ")).ok()
}

fn forwardable_headers(incoming: &HeaderMap, upstream: Upstream) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming.iter() {
        if is_hop_by_hop(name)
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == SESSION_ROLE_HEADER
        {
            continue;
        }
        // Rebuilt for the backend from the cookie jar and session token.
        if upstream == Upstream::Backend
            && (name == header::COOKIE || name == header::AUTHORIZATION)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == header::CONNECTION
        || name == header::PROXY_AUTHENTICATE
        || name == header::PROXY_AUTHORIZATION
        || name == header::TE
        || name == header::TRAILER
        || name == header::TRANSFER_ENCODING
        || name == header::UPGRADE
        || name.as_str() == "keep-alive"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("courts.example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=a.b.c"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer forged"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(SESSION_ROLE_HEADER.clone(), HeaderValue::from_static("admin"));
        headers
    }

    #[test]
    fn backend_headers_drop_credentials_and_hop_by_hop() {
        let headers = forwardable_headers(&incoming(), Upstream::Backend);

        assert!(headers.get(header::COOKIE).is_none());
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(&SESSION_ROLE_HEADER).is_none());
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn frontend_headers_keep_cookies() {
        let headers = forwardable_headers(&incoming(), Upstream::Frontend);

        assert_eq!(headers[header::COOKIE], "accessToken=a.b.c");
        assert!(headers.get(&SESSION_ROLE_HEADER).is_none());
        assert!(headers.get(header::HOST).is_none());
    }

    #[test]
    fn backend_cookies_exclude_session_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("accessToken=a.b.c; refreshToken=r1"),
        );
        let jar = CookieJar::from_headers(&headers);

        assert_eq!(backend_cookie_header(&jar).unwrap(), "refreshToken=r1");
    }

    #[test]
    fn backend_cookies_absent_with_only_session_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=a.b.c"));
        let jar = CookieJar::from_headers(&headers);

        assert!(backend_cookie_header(&jar).is_none());
    }

    #[test]
    fn backend_url_is_versioned() {
        assert_eq!(
            backend_api_url("http://backend:5000/", "/zones/post-zone"),
            "http://backend:5000/api/v1/zones/post-zone"
        );
    }
}
