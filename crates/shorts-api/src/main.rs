//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shorts_api::{create_router, ApiConfig, AppState, JsonLineFormatter};
use shorts_media::{FfmpegRenderer, WhisperCli};
use shorts_registry::dispatch::run_dispatcher;
use shorts_registry::{JobRegistry, RegistryConfig};
use shorts_storage::DriveClient;
use shorts_worker::{DefaultFetcher, GeminiClient, JobPipeline, PipelineConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing: one flat JSON object per line on stdout
    tracing_subscriber::registry()
        .with(fmt::layer().event_format(JsonLineFormatter))
        .with(
            EnvFilter::from_default_env().add_directive("shorts=info".parse().unwrap()),
        )
        .init();

    info!("Starting shorts-api");

    let api_config = ApiConfig::from_env();
    let registry_config = RegistryConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();

    for issue in api_config
        .validate()
        .into_iter()
        .chain(pipeline_config.validate())
    {
        warn!("Config: {}", issue);
    }

    info!(
        host = %api_config.host,
        port = api_config.port,
        max_concurrent_jobs = registry_config.max_concurrent_jobs,
        max_queue_depth = registry_config.max_queue_depth,
        "Configuration loaded"
    );

    let storage: Arc<dyn shorts_storage::StorageClient> = match DriveClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let registry = Arc::new(JobRegistry::new(registry_config));

    let model = pipeline_config.gemini_api_key.as_ref().map(|key| {
        Arc::new(GeminiClient::new(key, &pipeline_config.gemini_model))
            as Arc<dyn shorts_worker::HighlightModel>
    });
    if model.is_none() {
        info!("No LLM credential configured; selection will be rule-based");
    }

    let stt = Arc::new(WhisperCli::new(
        &pipeline_config.whisper_binary,
        pipeline_config.transcribe_timeout,
    ));

    let fetcher = Arc::new(DefaultFetcher::new(
        Arc::clone(&storage),
        pipeline_config.clone(),
    ));

    let pipeline = Arc::new(JobPipeline::new(
        pipeline_config,
        Arc::clone(&registry),
        fetcher,
        stt,
        model,
        Arc::new(FfmpegRenderer::new()),
        storage,
    ));

    let pipeline_for_dispatch = Arc::clone(&pipeline);
    run_dispatcher(Arc::clone(&registry), move |job| {
        let pipeline = Arc::clone(&pipeline_for_dispatch);
        async move { pipeline.run(job).await }
    });

    let state = AppState::new(api_config.clone(), registry);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", api_config.host, api_config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
