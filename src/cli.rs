use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::policy::{authorize, normalize_path, Decision, RoutePolicy};
use crate::startup::validate_environment;

#[derive(Parser)]
#[command(name = "court-gate")]
#[command(about = "Court Gate - role-based route gate for the court booking site", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Configuration validation
    Config,

    /// Print the effective route policy as JSON
    Policy,

    /// Evaluate a navigation without starting the server
    Check {
        /// Request path, e.g. /warehouse/orders
        #[arg(value_name = "PATH")]
        path: String,

        /// Raw accessToken cookie value
        #[arg(short, long)]
        token: Option<String>,
    },
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Backend URL: {}", config.backend_url);
    println!("  Frontend URL: {}", config.frontend_url);
    println!(
        "  Route Policy: {}",
        config
            .route_policy_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );
    println!("  Secure Cookie: {}", config.cookie_secure);

    let report = validate_environment(config).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("configuration is invalid");
    }

    tracing::info!("Configuration is valid");
    Ok(())
}

pub fn handle_policy_print(policy: &RoutePolicy) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(policy)?);
    Ok(())
}

pub fn handle_check(policy: &RoutePolicy, path: &str, token: Option<&str>) -> anyhow::Result<()> {
    if !path.starts_with('/') {
        anyhow::bail!("path must start with '/', got {path:?}");
    }

    println!("{}", describe_decision(policy, path, token));
    Ok(())
}

fn describe_decision(policy: &RoutePolicy, raw: &str, token: Option<&str>) -> String {
    let Some(path) = normalize_path(raw) else {
        return format!("{raw}: rejected (malformed path)");
    };
    let path = path.as_str();

    if policy.excluded.is_excluded(path) {
        return format!("{path}: not guarded (excluded)");
    }

    match authorize(policy, path, token) {
        Decision::Allow { role: None } => format!("{path}: allow (public)"),
        Decision::Allow { role: Some(role) } => format!("{path}: allow as {role}"),
        Decision::SignIn { location } => format!("{path}: redirect to {location} (no session)"),
        Decision::RoleDefault { role, location } => {
            format!("{path}: redirect to {location} (not permitted for {role})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::tests::token_for;
    use serde_json::json;

    #[test]
    fn describes_each_outcome() {
        let policy = RoutePolicy::standard();
        let hr = token_for(&json!({"role": "hr_manager"}));

        assert_eq!(
            describe_decision(&policy, "/faq", None),
            "/faq: allow (public)"
        );
        assert_eq!(
            describe_decision(&policy, "/approvals", Some(&hr)),
            "/approvals: allow as hr_manager"
        );
        assert_eq!(
            describe_decision(&policy, "/profile", None),
            "/profile: redirect to /signin?callbackUrl=%2Fprofile (no session)"
        );
        assert_eq!(
            describe_decision(&policy, "/warehouse", Some(&hr)),
            "/warehouse: redirect to /employees (not permitted for hr_manager)"
        );
        assert_eq!(
            describe_decision(&policy, "/_next/static/app.js", None),
            "/_next/static/app.js: not guarded (excluded)"
        );
    }

    #[test]
    fn describes_the_normalised_path() {
        let policy = RoutePolicy::standard();

        assert_eq!(
            describe_decision(&policy, "/_next/static/../../admin/dashboard", None),
            "/admin/dashboard: redirect to /signin?callbackUrl=%2Fadmin%2Fdashboard (no session)"
        );
        assert_eq!(
            describe_decision(&policy, "/faq/..%2Fadmin", None),
            "/faq/..%2Fadmin: rejected (malformed path)"
        );
    }

    #[test]
    fn check_rejects_relative_paths() {
        assert!(handle_check(&RoutePolicy::standard(), "booking", None).is_err());
    }
}
