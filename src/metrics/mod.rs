//! Prometheus counters for the sync engine and an optional `/metrics` exporter.


use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    /// Long-poll round trips by outcome: not_modified, changed, no_progress, failed
    pub static ref LONG_POLL_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("long_poll_total", "long poll round trips by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    /// Namespace fetches by outcome: ok, no_data
    pub static ref FETCH_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("namespace_fetch_total", "namespace configuration fetches"),
        &["namespace", "outcome"]
    )
    .expect("metric can not be created");

    /// Dispatched change events by kind
    pub static ref CHANGE_EVENT_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("change_event_total", "change events delivered to the listener"),
        &["kind"]
    )
    .expect("metric can not be created");

    /// Cache file writes: written, skipped (hash unchanged)
    pub static ref CACHE_FILE_WRITE_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("cache_file_write_total", "namespace cache file writes"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref SHARED_CACHE_OVERFLOW_METRIC: IntCounter = IntCounter::new(
        "shared_cache_overflow_total",
        "shared cache mutations rejected for exceeding capacity"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(LONG_POLL_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(FETCH_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CHANGE_EVENT_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CACHE_FILE_WRITE_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SHARED_CACHE_OVERFLOW_METRIC.clone()))
        .expect("collector can be registered");
}

/// Text exposition of every counter in [`REGISTRY`]
pub fn render_metrics() -> String {
    use prometheus::Encoder;

    REGISTER_ONCE.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

/// Serves `/metrics` until `shutdown_signal` fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!("metrics server listening on 0.0.0.0:{}", port);
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(render_metrics())
}
