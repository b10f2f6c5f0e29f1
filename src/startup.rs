use crate::config::Config;
use anyhow::{Context, Result};
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub policy: bool,
    pub backend: bool,
    pub frontend: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.policy && self.backend && self.frontend
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Route Policy:          {}", status(self.policy));
        println!("Backend Connectivity:  {}", status(self.backend));
        println!("Frontend Connectivity: {}", status(self.frontend));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        policy: true,
        backend: true,
        frontend: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
    }

    if let Err(e) = config.load_policy() {
        report.policy = false;
        report.errors.push(format!("Route policy: {:#}", e));
    }

    if let Err(e) = validate_upstream(&config.backend_url).await {
        report.backend = false;
        report.errors.push(format!("Backend: {:#}", e));
    }

    if let Err(e) = validate_upstream(&config.frontend_url).await {
        report.frontend = false;
        report.errors.push(format!("Frontend: {:#}", e));
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.backend_url.is_empty() {
        anyhow::bail!("BACKEND_URL is empty");
    }
    if config.frontend_url.is_empty() {
        anyhow::bail!("FRONTEND_URL is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }

    url::Url::parse(&config.backend_url).context("BACKEND_URL is not a valid URL")?;
    url::Url::parse(&config.frontend_url).context("FRONTEND_URL is not a valid URL")?;

    Ok(())
}

/// Any HTTP answer below 500 means the upstream is up; a 404 on `/` is
/// normal for an API server.
async fn validate_upstream(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let response = client
        .get(base_url)
        .send()
        .await
        .with_context(|| format!("Failed to connect to {base_url}"))?;

    if response.status().is_server_error() {
        anyhow::bail!("{} returned status: {}", base_url, response.status());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_validate_env_vars_empty_backend_url() {
        let config = test_config("", "http://localhost:3000");
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_invalid_url() {
        let config = test_config("not-a-url", "http://localhost:3000");
        assert!(validate_env_vars(&config).is_err());
    }

    #[tokio::test]
    async fn test_validate_environment_with_live_upstreams() {
        let mut backend = mockito::Server::new_async().await;
        let backend_mock = backend
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;
        let mut frontend = mockito::Server::new_async().await;
        frontend.mock("GET", "/").with_status(200).create_async().await;

        let config = test_config(&backend.url(), &frontend.url());
        let report = validate_environment(&config).await;

        backend_mock.assert_async().await;
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[tokio::test]
    async fn test_validate_environment_reports_failing_backend() {
        let mut backend = mockito::Server::new_async().await;
        backend.mock("GET", "/").with_status(503).create_async().await;
        let mut frontend = mockito::Server::new_async().await;
        frontend.mock("GET", "/").with_status(200).create_async().await;

        let config = test_config(&backend.url(), &frontend.url());
        let report = validate_environment(&config).await;

        assert!(!report.backend);
        assert!(report.frontend);
        assert!(!report.is_valid());
        assert!(report.errors[0].starts_with("Backend:"));
    }
}
