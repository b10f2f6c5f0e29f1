use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DependencyStatus::Healthy { .. })
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

/// Probes an HTTP upstream. Any HTTP answer counts as reachable; only
/// transport failures make it unhealthy.
pub struct UpstreamChecker {
    client: reqwest::Client,
    url: String,
}

impl UpstreamChecker {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl DependencyChecker for UpstreamChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.get(&self.url).send().await {
            Ok(_) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

pub const BACKEND: &str = "backend";
pub const FRONTEND: &str = "frontend";

/// Without the backend no session can be issued; without the frontend only
/// pages are lost, the API keeps working.
const CRITICAL_DEPENDENCIES: [&str; 1] = [BACKEND];

pub async fn check_health(
    backend: &dyn DependencyChecker,
    frontend: &dyn DependencyChecker,
    start_time: Instant,
) -> HealthResponse {
    let timeout_duration = Duration::from_secs(5);

    let (backend_result, frontend_result) = tokio::join!(
        timeout(timeout_duration, backend.check()),
        timeout(timeout_duration, frontend.check())
    );

    let mut dependencies = HashMap::new();

    dependencies.insert(
        BACKEND.to_string(),
        backend_result.unwrap_or_else(|_| DependencyStatus::unhealthy("timeout")),
    );

    dependencies.insert(
        FRONTEND.to_string(),
        frontend_result.unwrap_or_else(|_| DependencyStatus::unhealthy("timeout")),
    );

    HealthResponse {
        status: determine_overall_status(&dependencies),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

fn determine_overall_status(dependencies: &HashMap<String, DependencyStatus>) -> String {
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if !status.is_healthy() {
            if CRITICAL_DEPENDENCIES.contains(&name.as_str()) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
