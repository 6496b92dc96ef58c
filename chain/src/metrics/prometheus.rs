//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed chain metrics, and a
//! [`MetricsExporter`]: a background task serving them over HTTP that is
//! started and stopped with the node, like the slot ticker.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, warn};

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Chain-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and can be updated from the node
/// loop observing chain events.
#[derive(Clone)]
pub struct ChainMetrics {
    /// Latency of one full block ingest (validate + persist + index), in
    /// seconds.
    pub block_ingest_seconds: Histogram,
    /// Total number of blocks appended to the chain.
    pub blocks_added: IntCounter,
    /// Total number of blocks finalized.
    pub blocks_finalized: IntCounter,
    /// Total number of attestations absorbed into blocks.
    pub attestations_received: IntCounter,
    /// Judgments currently pending in the pool.
    pub judgments_pending: IntGauge,
}

impl ChainMetrics {
    /// Registers chain metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        // Block ingest latency. Slots are sub-second, so the buckets skew
        // far smaller than typical request histograms.
        let block_ingest_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "chain_block_ingest_seconds",
                "Time to validate, persist, and index one block in seconds",
            )
            .buckets(vec![
                0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
            ]),
        )?;
        registry.register(Box::new(block_ingest_seconds.clone()))?;

        let blocks_added = IntCounter::with_opts(Opts::new(
            "chain_blocks_added_total",
            "Total number of blocks appended to the chain",
        ))?;
        registry.register(Box::new(blocks_added.clone()))?;

        let blocks_finalized = IntCounter::with_opts(Opts::new(
            "chain_blocks_finalized_total",
            "Total number of blocks finalized by attestation quorum",
        ))?;
        registry.register(Box::new(blocks_finalized.clone()))?;

        let attestations_received = IntCounter::with_opts(Opts::new(
            "chain_attestations_received_total",
            "Total number of attestations absorbed into blocks",
        ))?;
        registry.register(Box::new(attestations_received.clone()))?;

        let judgments_pending = IntGauge::with_opts(Opts::new(
            "chain_judgments_pending",
            "Judgments currently pending in the pool",
        ))?;
        registry.register(Box::new(judgments_pending.clone()))?;

        Ok(Self {
            block_ingest_seconds,
            blocks_added,
            blocks_finalized,
            attestations_received,
            judgments_pending,
        })
    }
}

/// Wrapper around a Prometheus registry and the chain metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the chain metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("poj".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Handle to the background metrics exporter task.
///
/// The exporter serves:
///
/// - `GET /metrics`: Prometheus text exposition of the chain metrics,
/// - `GET /healthz`: a bare liveness probe,
///
/// and answers 404 to everything else. [`MetricsExporter::stop`] ends the
/// accept loop; connections already being served finish on their own.
pub struct MetricsExporter {
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl MetricsExporter {
    /// Binds `addr` and spawns the exporter task.
    ///
    /// Binding happens here rather than inside the task so a busy port
    /// fails node startup instead of dying silently in the background.
    pub async fn bind(metrics: Arc<MetricsRegistry>, addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown, mut watch_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let stream = match accepted {
                            Ok((stream, _)) => stream,
                            Err(e) => {
                                warn!(error = %e, "metrics exporter accept failed");
                                continue;
                            }
                        };
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            let svc = service_fn(move |req: Request<Incoming>| {
                                let metrics = metrics.clone();
                                async move { Ok::<_, Infallible>(route(&req, &metrics)) }
                            });
                            let served = http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), svc)
                                .await;
                            if let Err(e) = served {
                                // Scrape clients come and go; a broken
                                // connection is not node trouble.
                                debug!(error = %e, "metrics connection error");
                            }
                        });
                    }
                    changed = watch_rx.changed() => {
                        if changed.is_err() || *watch_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self { shutdown, handle })
    }

    /// Stops accepting connections and waits for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Routes one request. Generic over the body so tests can drive it without
/// a live connection.
fn route<B>(req: &Request<B>, metrics: &MetricsRegistry) -> Response<Full<Bytes>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4",
            metrics.gather_text(),
        ),
        (&Method::GET, "/healthz") => {
            text_response(StatusCode::OK, "text/plain", "ok".to_string())
        }
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "not found".to_string()),
    }
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn chain_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ChainMetrics::register(&registry).expect("register metrics");

        metrics.block_ingest_seconds.observe(0.003);
        metrics.blocks_added.inc();
        metrics.blocks_finalized.inc();
        metrics.attestations_received.inc();
        metrics.judgments_pending.set(42);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.chain.block_ingest_seconds.observe(0.001);
        let text = registry.gather_text();
        assert!(text.contains("chain_block_ingest_seconds"));
        assert!(text.contains("chain_blocks_added_total"));
    }

    #[test]
    fn route_serves_metrics_health_and_404() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.chain.blocks_added.inc();

        let req = Request::builder()
            .method(Method::GET)
            .uri("/metrics")
            .body(())
            .expect("request");
        let resp = route(&req, &registry);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );

        let req = Request::builder().uri("/healthz").body(()).expect("request");
        assert_eq!(route(&req, &registry).status(), StatusCode::OK);

        let req = Request::builder().uri("/nope").body(()).expect("request");
        assert_eq!(route(&req, &registry).status(), StatusCode::NOT_FOUND);

        // Only GET is served.
        let req = Request::builder()
            .method(Method::POST)
            .uri("/metrics")
            .body(())
            .expect("request");
        assert_eq!(route(&req, &registry).status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exporter_binds_an_ephemeral_port_and_stops() {
        let registry = Arc::new(MetricsRegistry::new().expect("create metrics registry"));
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("address literal");
        let exporter = MetricsExporter::bind(registry, addr).await.expect("bind");
        exporter.stop().await;
    }
}
