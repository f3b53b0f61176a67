// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics). Safe to call more than once.
pub fn init_telemetry() {
    let logs = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "strata_node=debug,strata_kernel=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if logs.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Prometheus recorder not installed: {}", e),
    }

    metrics::describe_counter!("strata_poll_cycles_total", "Poll cycles run by feed clients");
    metrics::describe_histogram!("strata_page_fetch_duration_seconds", "Time taken to read one page from the store");
    metrics::describe_counter!("strata_page_cache_hits_total", "Pages served from the page cache");
    metrics::describe_counter!("strata_page_cache_misses_total", "Pages read from the store");
    metrics::describe_counter!("strata_commits_delivered_total", "Commits handed to subscriber callbacks");
    metrics::describe_counter!("strata_delivery_failures_total", "Subscriber callbacks that failed or panicked");
    metrics::describe_gauge!("strata_subscribers_active", "Subscribers currently registered");
}

/// Prometheus exposition text for everything recorded so far.
pub fn render_metrics() -> String {
    match PROM_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# metrics not initialized".to_string(),
    }
}
