use anyhow::{Context, Result};
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, LambdaEvent};
use resizer_service::config::ServiceConfig;
use resizer_service::handler::handle_s3_event;
use resizer_service::{Config, ImageProcessor, RasterEngine, S3ObjectStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service);

    config.validate().context("Invalid configuration")?;

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting resizer service"
    );

    let store = Arc::new(S3ObjectStore::new(&config.s3, &config.upload).await);
    let engine = Arc::new(RasterEngine::new(config.resize.clone()));
    let processor = Arc::new(
        ImageProcessor::from_config(&config, store, engine)
            .context("Failed to build image processor")?,
    );

    run(service_fn(move |event: LambdaEvent<S3Event>| {
        let processor = Arc::clone(&processor);
        async move {
            handle_s3_event(&processor, event)
                .await
                .map_err(lambda_runtime::Error::from)
        }
    }))
    .await
    .map_err(|e| anyhow::anyhow!("Lambda runtime error: {e}"))
}

/// Initialize tracing/logging
fn init_tracing(service: &ServiceConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&service.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    // CloudWatch stamps ingestion time on every line
    if service.log_format == "pretty" {
        registry.with(fmt::layer().pretty().without_time()).init();
    } else {
        registry
            .with(fmt::layer().json().with_target(false).without_time())
            .init();
    }
}
