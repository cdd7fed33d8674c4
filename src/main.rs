use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use drive_core::config::{max_depth_from_env_value, token_ttl_from_env_value};
use drive_core::constants::DEFAULT_DATA_DIR;
use drive_core::{CoreConfig, DriveServices, InMemoryTokenStore};

/// Main entry point for the Drive server
///
/// Resolves configuration from the environment once, opens the stores under the data directory
/// and serves the REST API with Swagger UI at `/swagger-ui`.
///
/// # Environment Variables
/// - `DRIVE_REST_ADDR`: REST server address (default: "0.0.0.0:5000")
/// - `DRIVE_DATA_DIR`: Directory for users, metadata and content (default: "drive_data")
/// - `DRIVE_TOKEN_TTL_SECS`: Session lifetime in seconds (default: 86400)
/// - `DRIVE_MAX_DEPTH`: Maximum folder nesting (default: 1000)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration values are invalid or the data directory cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drive=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("DRIVE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".into());
    let data_dir = std::env::var("DRIVE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

    let cfg = CoreConfig::new(
        data_dir,
        token_ttl_from_env_value(std::env::var("DRIVE_TOKEN_TTL_SECS").ok())?,
        max_depth_from_env_value(std::env::var("DRIVE_MAX_DEPTH").ok())?,
    )?;

    let tokens = Arc::new(InMemoryTokenStore::new());
    let services = DriveServices::open_with_tokens(&cfg, tokens.clone())?;

    // Expired tokens are ignored on lookup; this only bounds memory.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            let purged = tokens.purge_expired();
            if purged > 0 {
                tracing::debug!("purged {} expired tokens", purged);
            }
        }
    });

    let app = router(AppState::new(services));

    tracing::info!("-- Starting Drive REST API on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
