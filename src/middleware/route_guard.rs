use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{uri::PathAndQuery, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tower::{Layer, Service};

use crate::auth::SESSION_COOKIE;
use crate::policy::{authorize, normalize_path, Decision, RoutePolicy};

/// Applies [`RoutePolicy`] to page navigations.
///
/// Decisions are made on the normalised path, and the request URI is
/// rewritten to it before the inner service sees it. Paths that cannot be
/// normalised get `400 Bad Request`.
///
/// Denied requests never reach the inner service; they are answered with a
/// `307 Temporary Redirect` to the sign-in page or the role's landing page.
/// Allowed requests carry the resolved [`EffectiveRole`](crate::auth::EffectiveRole)
/// in their extensions when a session was present.
#[derive(Clone, Debug)]
pub struct RouteGuardLayer {
    policy: Arc<RoutePolicy>,
}

impl RouteGuardLayer {
    pub fn new(policy: Arc<RoutePolicy>) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RouteGuardLayer {
    type Service = RouteGuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteGuardService {
            inner,
            policy: Arc::clone(&self.policy),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RouteGuardService<S> {
    inner: S,
    policy: Arc<RoutePolicy>,
}

impl<S, B> Service<Request<B>> for RouteGuardService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = futures_util::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let Some(path) = canonicalize(&mut req) else {
            tracing::info!(path = %req.uri().path(), "rejecting non-canonical path");
            let response = StatusCode::BAD_REQUEST.into_response();
            return Box::pin(async move { Ok(response) });
        };

        if !self.policy.excluded.is_excluded(&path) {
            let jar = CookieJar::from_headers(req.headers());
            let token = jar.get(SESSION_COOKIE).map(|cookie| cookie.value());

            match authorize(&self.policy, &path, token) {
                Decision::Allow { role } => {
                    tracing::debug!(path = %path, role = ?role, "navigation allowed");
                    if let Some(role) = role {
                        req.extensions_mut().insert(role);
                    }
                }
                Decision::SignIn { location } => {
                    tracing::info!(path = %path, location = %location, "redirecting unauthenticated navigation to sign-in");
                    let response = Redirect::temporary(&location).into_response();
                    return Box::pin(async move { Ok(response) });
                }
                Decision::RoleDefault { role, location } => {
                    tracing::info!(path = %path, role = %role, location = %location, "redirecting navigation outside role permissions");
                    let response = Redirect::temporary(&location).into_response();
                    return Box::pin(async move { Ok(response) });
                }
            }
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Rewrites the request URI to its normalised path so the decision and the
/// upstream see the same resource. Returns that path.
fn canonicalize<B>(req: &mut Request<B>) -> Option<String> {
    let path = normalize_path(req.uri().path())?;

    if path != req.uri().path() {
        let path_and_query = match req.uri().query() {
            Some(query) => format!("{path}?{query}"),
            None => path.clone(),
        };
        let mut parts = req.uri().clone().into_parts();
        parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
        *req.uri_mut() = Uri::from_parts(parts).ok()?;
    }

    Some(path)
}
