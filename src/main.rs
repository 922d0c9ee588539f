use std::sync::Arc;

use flight_delay::{config::ServiceConfig, pipeline::Pipeline, server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServiceConfig::from_env();

    // Load once; a failed load leaves the service up but answering 503.
    let pipeline = Pipeline::load(&cfg.artifacts).with_feature_logging(cfg.log_predictions);
    if !pipeline.is_ready() {
        tracing::warn!("starting without a model; /predict_model will return 503");
    }

    let app = server::router(Arc::new(pipeline));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
