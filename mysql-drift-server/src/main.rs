use std::sync::Arc;

use clap::Parser as _;
use mysql_drift::{DriftDetector, KubeApi, NodeCache, NodeWatch};
use tokio_util::sync::CancellationToken;

use config::Config;

mod config;
mod reconcile;
mod routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();
    tracing::info!(?config, "Starting mysql-drift-server");

    let api = KubeApi::new()
        .await
        .inspect_err(|err| tracing::error!(?err, "Unable to get cluster configuration"))?;
    let api = Arc::new(api);

    let cache = NodeCache::new().prune_deleted(config.prune_deleted_nodes);
    let cache = Arc::new(cache);

    let token = CancellationToken::new();
    let watch = NodeWatch::new(api.clone(), cache.clone())
        .initialize_first(config.initialize_retry())
        .restart(config.restart_policy())
        .spawn(token.clone());

    let detector = Arc::new(DriftDetector::new(api, cache));

    if let Some(period) = config.reconcile_interval() {
        tracing::info!(?period, evict = config.evict, "Starting reconcile loop");
        tokio::spawn(reconcile::run(
            detector.clone(),
            period,
            config.evict,
            token.clone(),
        ));
    }

    let app = routes::router(detector);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{addr}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(token.clone()))
        .await?;

    token.cancel();
    match watch.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(?err, "Node watch had stopped"),
        Err(err) => tracing::error!(?err, "Node watch task panicked"),
    }

    Ok(())
}

async fn shutdown(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(?err, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
        }
        () = token.cancelled() => {}
    }
    token.cancel();
}
