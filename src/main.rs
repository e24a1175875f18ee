use std::process;

use folia::{
    application::{
        error::AppError,
        render::{EngineRegistry, PipelineConfig, RenderPipeline},
    },
    config,
    infra::{
        error::InfraError,
        http::{HttpState, build_router},
        telemetry,
        warmup::CacheWarmer,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let registry = EngineRegistry::builtin();
    let pipeline = RenderPipeline::new(PipelineConfig::from(&settings.site), &registry)?;

    info!(
        target = "folia::startup",
        root = %settings.site.root.display(),
        environment = %settings.site.environment,
        cache_enabled = pipeline.config().cache_enabled,
        routes = settings.routes.len(),
        "pipeline configured"
    );

    let warmed = CacheWarmer::new(pipeline.clone()).warm(&settings.routes).await;
    if warmed > 0 {
        info!(target = "folia::startup", warmed, "startup cache warmup finished");
    }

    let router = build_router(HttpState { pipeline }, &settings.routes);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "folia::startup",
        addr = %settings.server.addr,
        graceful_shutdown_secs = settings.server.graceful_shutdown.as_secs(),
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(error = %error, "failed to install shutdown signal handler");
    }
}
