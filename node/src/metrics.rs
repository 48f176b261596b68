//! # Prometheus Metrics
//!
//! Operational metrics for the node, scraped at `/metrics` on the configured
//! metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `fundhub` prefix so they do not collide with the default registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Prometheus handles are reference-counted internally, so clones share
/// the same underlying series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Projects created through the hub.
    pub projects_created_total: IntCounter,
    /// Accepted contributions.
    pub contributions_total: IntCounter,
    /// Payouts to beneficiaries. At most one per project.
    pub payouts_total: IntCounter,
    /// Refunds issued after expiry.
    pub refunds_total: IntCounter,
    /// Rejected calls, labelled by error kind.
    pub rejected_calls_total: IntCounterVec,
    /// Projects currently held by the hub.
    pub projects_registered: IntGauge,
    /// JSON-RPC handling latency, labelled by method.
    pub rpc_latency_seconds: HistogramVec,
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("fundhub".into()), None)?;

        let projects_created_total = register(
            &registry,
            IntCounter::new("projects_created_total", "Total number of projects created")?,
        )?;
        let contributions_total = register(
            &registry,
            IntCounter::new(
                "contributions_total",
                "Total number of accepted contributions",
            )?,
        )?;
        let payouts_total = register(
            &registry,
            IntCounter::new("payouts_total", "Total number of goal payouts")?,
        )?;
        let refunds_total = register(
            &registry,
            IntCounter::new("refunds_total", "Total number of refunds issued")?,
        )?;
        let rejected_calls_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("rejected_calls_total", "Rejected calls by error kind"),
                &["kind"],
            )?,
        )?;
        let projects_registered = register(
            &registry,
            IntGauge::new("projects_registered", "Number of projects held by the hub")?,
        )?;
        let rpc_latency_seconds = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "rpc_latency_seconds",
                    "JSON-RPC request handling latency in seconds",
                )
                .buckets(vec![
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
                ]),
                &["method"],
            )?,
        )?;

        Ok(Self {
            registry,
            projects_created_total,
            contributions_total,
            payouts_total,
            refunds_total,
            rejected_calls_total,
            projects_registered,
            rpc_latency_seconds,
        })
    }

    /// Counts one rejected call of the given kind.
    pub fn record_rejection(&self, kind: &str) {
        self.rejected_calls_total.with_label_values(&[kind]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_prefixed_names() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.projects_created_total.inc();
        metrics.record_rejection("FundingRejected");
        metrics
            .rpc_latency_seconds
            .with_label_values(&["hub_countOfProjects"])
            .observe(0.002);

        let text = metrics.encode().unwrap();
        assert!(text.contains("fundhub_projects_created_total 1"));
        assert!(text.contains(r#"fundhub_rejected_calls_total{kind="FundingRejected"} 1"#));
        assert!(text.contains("fundhub_rpc_latency_seconds_bucket"));
    }

    #[test]
    fn registries_are_independent() {
        let a = NodeMetrics::new().unwrap();
        let b = NodeMetrics::new().unwrap();
        a.payouts_total.inc();
        assert_eq!(a.payouts_total.get(), 1);
        assert_eq!(b.payouts_total.get(), 0);
    }
}
