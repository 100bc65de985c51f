// src/main.rs
use anyhow::Result;
use hyper::{Body, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use heartbeat::{
    config,
    metrics::MetricsRegistry,
    server::{builder, listener::bind_tcp, HeartbeatHandler, HeartbeatService, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("heartbeat=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "heartbeat.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut service = HeartbeatService::from_config(&config)?;

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_registry = MetricsRegistry::new()?;
        service = service.with_metrics(metrics_registry.collector());

        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(
            metrics_addr,
            metrics_registry,
            config.metrics.path.clone(),
            shutdown_rx.clone(),
        )
        .await?;
    }

    info!(
        service = %config.service_name,
        dependencies = service.dependencies().len(),
        "Heartbeat configured"
    );

    let handler = HeartbeatHandler::new(Arc::new(service), config.endpoint_path());

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Serving heartbeat on http://{}{}", addr, config.endpoint_path());

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    ServerBuilder::new(addr)
        .with_handler(handler)
        .serve_with_shutdown(wait_for(shutdown_rx))
        .await?;

    info!("Heartbeat stopped");
    Ok(())
}

async fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let service = tower::service_fn(move |req: Request<Body>| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            let response = if req.uri().path() == path.as_str() {
                match registry.gather() {
                    Ok(metrics) => Response::builder()
                        .status(StatusCode::OK)
                        .header("Content-Type", "text/plain; version=0.0.4")
                        .body(Body::from(metrics)),
                    Err(e) => {
                        error!("Failed to encode metrics: {}", e);
                        Response::builder()
                            .status(StatusCode::INTERNAL_SERVER_ERROR)
                            .body(Body::empty())
                    }
                }
            } else {
                Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(Body::from("Not Found"))
            };
            response.map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        }
    });

    let listener = bind_tcp(addr).await?;

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = builder::run(listener, service, wait_for(shutdown)).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
