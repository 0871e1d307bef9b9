use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use tts_core::{select_engine, AudioCache, Dispatcher, PresetRegistry};
use tts_server::config::{Cli, ServerConfig};
use tts_server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry RUST_LOG, so load it before the filter reads the environment
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?.with_cli(&cli);

    async_main(config).await
}

async fn async_main(config: ServerConfig) -> anyhow::Result<()> {
    info!("Starting TTS server...");

    let presets = match config.presets_file {
        Some(ref path) => PresetRegistry::from_file(path)?,
        None => PresetRegistry::builtin(),
    };
    info!("Loaded {} voice presets", presets.len());

    let cache = AudioCache::open(&config.cache_dir)?;
    info!("Audio cache at {}", cache.dir().display());

    let selection = select_engine(config.engine, &config.engine_settings())?;
    let dispatcher = Dispatcher::new(
        Arc::new(presets),
        cache,
        selection.engine,
        config.synthesis_timeout(),
    );
    let state = AppState::new(dispatcher);

    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, synthesis_timeout={}s",
        config.port, config.rate_limit_per_minute, config.synthesis_timeout_secs
    );

    // Global limit: every client shares the same bucket
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .period(config.rate_limit_period())
            .burst_size(config.rate_limit_burst())
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .context("Invalid rate limit configuration")?,
    );

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .into_inner();

    let app = router(state).layer(middleware_stack);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different --port.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
