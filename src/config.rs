use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::policy::RoutePolicy;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Base URL of the REST backend; API calls go to `{backend_url}/api/v1`.
    pub backend_url: String,
    /// Origin serving the pages the gate protects.
    pub frontend_url: String,
    pub route_policy_file: Option<PathBuf>,
    pub cookie_secure: bool,
    pub signin_callback: bool,
    pub cors_allowed_origins: Option<String>,
    pub log_request_body: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let policy = PolicySource::from_env()?;
        let production = env::var("APP_ENV")
            .map(|value| value.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            backend_url: env::var("BACKEND_URL").context("BACKEND_URL is not set")?,
            frontend_url: env::var("FRONTEND_URL").context("FRONTEND_URL is not set")?,
            route_policy_file: policy.route_policy_file,
            cookie_secure: parse_flag("COOKIE_SECURE", production)?,
            signin_callback: policy.signin_callback,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_request_body: parse_flag("LOG_REQUEST_BODY", false)?,
            log_format: log_format_from_env()?,
        })
    }

    pub fn policy_source(&self) -> PolicySource {
        PolicySource {
            route_policy_file: self.route_policy_file.clone(),
            signin_callback: self.signin_callback,
        }
    }

    pub fn load_policy(&self) -> anyhow::Result<Arc<RoutePolicy>> {
        self.policy_source().load()
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// The settings that shape the route table. Enough for the offline
/// `policy` and `check` commands, which never talk to an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySource {
    pub route_policy_file: Option<PathBuf>,
    pub signin_callback: bool,
}

impl PolicySource {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(PolicySource {
            route_policy_file: env::var("ROUTE_POLICY_FILE").ok().map(PathBuf::from),
            signin_callback: parse_flag("SIGNIN_CALLBACK", true)?,
        })
    }

    /// Builds the route table: the JSON file when configured, the built-in
    /// table otherwise. The sign-in callback is switched off when
    /// `SIGNIN_CALLBACK=false`.
    pub fn load(&self) -> anyhow::Result<Arc<RoutePolicy>> {
        let mut policy = match &self.route_policy_file {
            Some(path) => RoutePolicy::from_json_file(path)?,
            None => RoutePolicy::standard(),
        };

        if !self.signin_callback {
            policy.callback_param = None;
        }

        Ok(Arc::new(policy))
    }
}

pub fn log_format_from_env() -> anyhow::Result<LogFormat> {
    match env::var("LOG_FORMAT") {
        Ok(raw) => parse_log_format(&raw),
        Err(_) => Ok(LogFormat::default()),
    }
}

fn parse_flag(name: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw).with_context(|| format!("{name} must be true or false")),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean {other:?}"),
    }
}

fn parse_log_format(raw: &str) -> anyhow::Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "text" | "pretty" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got {other:?}"),
    }
}
