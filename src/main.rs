use anyhow::{Context, Result};
use clap::Parser;
use resource_ttl::config::{ControllerArgs, ControllerConfig, LogFormat};
use resource_ttl::{AdapterRegistry, ControllerMetrics, KubeStore, Reconciler, controller, shutdown, web};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::try_from(ControllerArgs::parse())
        .context("invalid controller configuration")?;
    init_tracing(&config);

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        trigger.trigger();
    });

    let client = kube::Client::try_default()
        .await
        .context("failed to build Kubernetes client")?;
    let store = Arc::new(KubeStore::new(client.clone()));
    let registry = Arc::new(AdapterRegistry::with_default_adapters(store));
    let metrics = Arc::new(ControllerMetrics::default());

    let reconciler = Reconciler::new(registry.clone())
        .with_settings(config.reconciler_settings())
        .with_metrics(metrics.clone())
        .with_shutdown(shutdown.clone());

    let server = config.metrics_addr.map(|addr| {
        let metrics = metrics.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = web::serve(addr, metrics, shutdown).await {
                error!(addr = %addr, error = %err, "Metrics endpoint failed");
            }
        })
    });

    info!(
        kinds = ?registry.kinds(),
        dry_run = config.dry_run,
        call_timeout_secs = config.call_timeout.as_secs(),
        max_concurrent_passes = config.max_concurrent_passes,
        retry_max_attempts = config.retry.max_attempts,
        "Resource TTL controller started"
    );

    controller::run(client, reconciler, &config, shutdown.clone())
        .await
        .context("policy watch failed")?;

    if let Some(server) = server {
        if shutdown.is_triggered() {
            server.await.context("metrics endpoint task failed")?;
        } else {
            server.abort();
        }
    }

    let snapshot = metrics.snapshot();
    info!(
        passes = snapshot.passes_total,
        deletions = snapshot.deletions,
        delete_failures = snapshot.delete_failures,
        "Resource TTL controller stopped"
    );
    Ok(())
}

fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
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
}
