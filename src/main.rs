use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pr_dashboard::api::InMemoryUserStore;
use pr_dashboard::config::Config;
use pr_dashboard::github::OctocrabClient;
use pr_dashboard::server::{Services, build_app};
use pr_dashboard::store::{FileInstallationStore, InMemoryInstallationStore, InstallationStore};

#[tokio::main]
async fn main() -> Result<(), pr_dashboard::BoxError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    let store: Arc<dyn InstallationStore> = match &config.state_dir {
        Some(dir) => {
            tracing::info!(state_dir = %dir.display(), "Persisting installations to disk");
            Arc::new(FileInstallationStore::new(dir))
        }
        None => {
            tracing::warn!("PR_DASH_STATE_DIR not set, installations are kept in memory");
            Arc::new(InMemoryInstallationStore::new())
        }
    };

    // Sessions are created by the sign-in flow, which lives outside this server.
    let services = Services {
        github: Arc::new(OctocrabClient::new()),
        store,
        users: Arc::new(InMemoryUserStore::new()),
    };
    let app = build_app(&config, services);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
