#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use court_gate::config::{Config, LogFormat};
use court_gate::{create_app, AppState};
use tokio::net::TcpListener;

pub fn test_config(backend_url: &str, frontend_url: &str) -> Config {
    Config {
        server_port: 0,
        backend_url: backend_url.to_string(),
        frontend_url: frontend_url.to_string(),
        route_policy_file: None,
        cookie_secure: false,
        signin_callback: true,
        cors_allowed_origins: None,
        log_request_body: false,
        log_format: LogFormat::Text,
    }
}

pub fn app(config: Config) -> axum::Router {
    let policy = config.load_policy().unwrap();
    create_app(AppState::new(config, policy).unwrap())
}

/// Serves the gate on an ephemeral port and returns its base URL.
pub async fn spawn_app(config: Config) -> String {
    let app = app(config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Browser-like client: redirects are observed, not followed.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Unsigned token with the given payload; the gate never checks signatures.
pub fn token_for(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

/// Request with the path exactly as written; reqwest would resolve dot
/// segments before sending.
pub fn raw_request(method: &str, path: &str, cookie: Option<&str>) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(axum::body::Body::empty()).unwrap()
}

pub fn session_cookie(token: &str) -> String {
    format!("accessToken={token}")
}
