use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use workers_ai_openai::config::{Cli, Config};
use workers_ai_openai::inference::workers_ai::WorkersAiClient;
use workers_ai_openai::server::openai_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "workers_ai_openai=debug,tower_http=debug"
    } else {
        "workers_ai_openai=info,tower_http=info"
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("workers-ai-openai v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_env();

    if config.backend.account_id.is_empty() {
        anyhow::bail!("no Workers AI account id configured (set CLOUDFLARE_ACCOUNT_ID)");
    }

    info!(
        default_model = config.model.default_model,
        aliases = config.model.aliases.len(),
        gateway = config.gateway.active_id().unwrap_or("none"),
        skip_cache = config.gateway.skip_cache,
        "Configuration loaded"
    );

    // Build application state.
    let backend = Arc::new(WorkersAiClient::new(&config));
    let state = Arc::new(AppState::new(backend, &config));

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = cli.listen.unwrap_or(config.server.listen);
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
