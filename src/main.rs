use std::net::SocketAddr;

use clap::Parser;
use court_gate::cli::{self, Cli, Commands};
use court_gate::config::{log_format_from_env, Config, LogFormat, PolicySource};
use court_gate::{create_app, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match log_format_from_env()? {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(Config::from_env()?).await,
        Commands::Config => cli::handle_config_validate(&Config::from_env()?).await,
        // Offline commands: only the policy settings are required.
        Commands::Policy => cli::handle_policy_print(&*PolicySource::from_env()?.load()?),
        Commands::Check { path, token } => cli::handle_check(
            &*PolicySource::from_env()?.load()?,
            &path,
            token.as_deref(),
        ),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let policy = config.load_policy()?;
    tracing::info!(
        roles = policy.roles.len(),
        source = ?config.route_policy_file,
        "route policy loaded"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = AppState::new(config, policy)?;
    tracing::info!(
        backend = %state.config.backend_url,
        frontend = %state.config.frontend_url,
        "upstreams configured"
    );

    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
