pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod policy;
pub mod startup;
pub mod utils;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    handler::Handler,
    http::{header, HeaderValue, Method},
    routing::{any, get, post},
    Router,
};
use tower::Layer;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::middleware::{request_logger::request_logger_middleware, route_guard::RouteGuardLayer};
use crate::policy::RoutePolicy;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub policy: Arc<RoutePolicy>,
    pub http: reqwest::Client,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, policy: Arc<RoutePolicy>) -> anyhow::Result<Self> {
        // Redirects from upstreams are relayed to the browser, never followed.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            policy,
            http,
            started_at: Instant::now(),
        })
    }
}

/// Builds the gate: session routes and the API passthrough under `/api`,
/// every other path is a page navigation checked by the route guard before
/// it is proxied to the frontend.
pub fn create_app(state: AppState) -> Router {
    let pages = RouteGuardLayer::new(Arc::clone(&state.policy))
        .layer(handlers::proxy::forward_page.with_state(state.clone()));

    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/signin", post(handlers::auth::signin))
        .route("/api/auth/signout", post(handlers::auth::signout))
        .route("/api/auth/session", get(handlers::auth::session))
        .route("/api/*rest", any(handlers::proxy::forward_api))
        .fallback_service(pages)
        .layer(axum::middleware::from_fn_with_state(
            state.config.log_request_body,
            request_logger_middleware,
        ));

    let router = match cors_layer(&state.config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(config: &Config) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}
