//! Metrics and instrumentation for the chain.
//!
//! This module defines Prometheus-compatible metrics for the chain node and
//! a small HTTP exporter that serves `/metrics` (Prometheus text format)
//! and `/healthz` (liveness). The exporter runs as a background task with
//! the same start/stop lifecycle as the slot ticker.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use poj_chain::metrics::{MetricsExporter, MetricsRegistry};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Bind fails startup on a busy port; the task serves in the background.
//! let exporter = MetricsExporter::bind(registry.clone(), addr).await?;
//!
//! // Elsewhere in the code:
//! registry.chain.blocks_added.inc();
//!
//! // On shutdown:
//! exporter.stop().await;
//! ```

pub mod prometheus;

pub use prometheus::{ChainMetrics, MetricsExporter, MetricsRegistry};
