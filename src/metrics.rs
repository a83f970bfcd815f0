// src/metrics.rs
//! Prometheus recorder and the `/metrics` exposition route.

use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder and publish the static scrape-pool gauge.
    /// Must run once at boot, before any scrape counters are touched.
    pub fn init(worker_pool_size: usize) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_gauge!(
            "scrape_worker_pool_size",
            "Upper bound on simultaneously scraped items."
        );
        gauge!("scrape_worker_pool_size").set(worker_pool_size as f64);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format;
    /// merged into the main app router at boot.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
