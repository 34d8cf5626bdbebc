use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info, warn};

use super::{
    services::{create_batch, get_batch, health},
    state::AppState,
};
use crate::checker::{LinkChecker, NoThreatLookup, ReqwestFetcher, SafeBrowsingClient, ThreatLookup};
use crate::config::Config;
use crate::ledger::LinkStore;
use crate::observability::Metrics;
use crate::orchestrator::{BatchCompletion, Orchestrator};
use crate::queue::{CheckBroker, CheckQueue, InflightRegistry};
use crate::webhook::HttpWebhookSink;
use crate::worker::{CheckExecutor, spawn_workers};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the HTTP router over an assembled application state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/batch", post(create_batch))
        .route("/batch/{batch_id}", get(get_batch))
        .route("/health", get(health))
        .with_state(state)
        // Automatically decompress gzip/deflate/brotli request bodies
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let address = address.unwrap_or(config.server.bind_addr);

    info!(path = %config.server.ledger_path.display(), "Opening ledger");
    let store = LinkStore::open(&config.server.ledger_path)
        .map_err(|e| format!("Failed to open ledger: {}", e))?;

    info!(path = %config.server.queue_path.display(), "Opening check queue");
    let queue = Arc::new(Mutex::new(
        CheckQueue::open(&config.server.queue_path)
            .map_err(|e| format!("Failed to open queue: {}", e))?,
    ));

    let inflight = Arc::new(InflightRegistry::new());
    let (broker, worker_receivers) = CheckBroker::new(
        queue.clone(),
        inflight.clone(),
        config.worker.count,
        config.worker.channel_size,
    );
    let broker = Arc::new(broker);

    let metrics = Arc::new(Metrics::new());

    let fetcher = Arc::new(
        ReqwestFetcher::new(&config.checker.fetcher())
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?,
    );
    let threat: Arc<dyn ThreatLookup> = match &config.safebrowsing.api_key {
        Some(api_key) => {
            info!("Safe Browsing lookups enabled");
            Arc::new(
                SafeBrowsingClient::new(&config.safebrowsing.endpoint, api_key)
                    .map_err(|e| format!("Failed to build Safe Browsing client: {}", e))?,
            )
        }
        None => {
            warn!("No Safe Browsing API key configured, threat lookups disabled");
            Arc::new(NoThreatLookup)
        }
    };
    let checker = Arc::new(LinkChecker::new(
        fetcher,
        threat,
        config.checker.settings(),
    ));

    let webhooks = Arc::new(
        HttpWebhookSink::new(config.worker.webhook_timeout.as_duration())
            .map_err(|e| format!("Failed to build webhook client: {}", e))?,
    );
    let completion = Arc::new(BatchCompletion::new(
        store.clone(),
        webhooks,
        metrics.clone(),
    ));

    let executor = Arc::new(CheckExecutor::new(
        store.clone(),
        checker,
        completion.clone(),
        metrics.clone(),
        config.worker.max_attempts,
        config.worker.retry_backoff.as_duration(),
    ));
    let worker_handles = spawn_workers(executor, worker_receivers, queue.clone(), inflight);

    // Re-dispatch work that was persisted but interrupted by a shutdown or
    // crash. New entries are enqueued first, then the stale ones removed;
    // execution is idempotent if both survive.
    let pending = queue.lock().await.pending()?;
    if !pending.is_empty() {
        info!(count = pending.len(), "Re-dispatching interrupted checks");
        for (stale_seq, check_id) in pending {
            broker.schedule(&check_id).await?;
            queue.lock().await.complete(stale_seq)?;
        }
    }

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        broker.clone(),
        completion,
        metrics.clone(),
        config.server.api.max_uris_per_batch,
    ));

    spawn_pruner(store.clone(), &config);

    let state = AppState::new(config, store, orchestrator, broker, metrics);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "linkaudit API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in worker_handles {
        handle.abort();
    }

    Ok(())
}

/// Periodic retention pruning in the background.
fn spawn_pruner(store: LinkStore, config: &Config) {
    let check_ttl_days = config.retention.check_ttl_days;
    let batch_ttl_days = config.retention.batch_ttl_days;
    let interval = config.retention.prune_interval.as_duration();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so startup stays fast.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.prune(check_ttl_days, batch_ttl_days) {
                Ok(stats) => {
                    info!(
                        checks = stats.checks_pruned,
                        batches = stats.batches_pruned,
                        "Retention pruning finished"
                    );
                }
                Err(err) => error!(error = %err, "Retention pruning failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
