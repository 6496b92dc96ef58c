// src/main.rs
//
// Minimal demo node that wires up the chain library:
//
// - RocksDB-backed content-addressed storage
// - Chain facade with the local node as its only validator
// - Slot ticker producing blocks from a synthetic judgment feed
// - Prometheus metrics exporter on /metrics
// - Clean shutdown on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info};

use poj_chain::{
    AttesterKey, Chain, ChainEvent, Cid, DefaultChain, Hash256, JudgmentRef, MetricsExporter,
    MetricsRegistry, NodeConfig, RocksDbCidStore, SlotTicker, Verdict, clock,
};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "poj_chain=info".to_string()),
        )
        .init();

    if let Err(err) = run_node().await {
        error!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    // For now, just use defaults. Later you can load from a file/CLI/env.
    let cfg = NodeConfig::default();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    let metrics_exporter = if cfg.metrics.enabled {
        let addr = cfg.metrics.listen_addr;
        let exporter = MetricsExporter::bind(metrics.clone(), addr)
            .await
            .map_err(|e| format!("failed to bind metrics exporter on {addr}: {e}"))?;
        info!("metrics exporter listening on http://{addr}/metrics");
        Some(exporter)
    } else {
        None
    };

    // ---------------------------
    // Storage backend (RocksDB)
    // ---------------------------

    let store = RocksDbCidStore::open(&cfg.storage)
        .map_err(|e| format!("failed to open RocksDB store at {}: {e}", cfg.storage.path))?;

    // ---------------------------
    // Chain init + validator identity
    // ---------------------------

    let mut chain: DefaultChain = Chain::init(store, cfg.consensus.clone(), cfg.node_id.clone())
        .map_err(|e| format!("chain init failed: {e}"))?;

    // In a real deployment the attester key comes from a secret store and
    // is distributed to every validator. For the demo we derive one from
    // the node id.
    let key = AttesterKey::from_seed(cfg.node_id.as_str().as_bytes());
    chain.register_validator(cfg.node_id.clone(), key);

    let mut events = chain.subscribe();
    let chain = Arc::new(Mutex::new(chain));

    // ---------------------------
    // Metrics from chain events
    // ---------------------------

    {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    ChainEvent::JudgmentPending { .. } => {
                        metrics.chain.judgments_pending.inc();
                    }
                    ChainEvent::BlockAdded { judgments, .. } => {
                        metrics.chain.blocks_added.inc();
                        metrics.chain.judgments_pending.sub(judgments as i64);
                    }
                    ChainEvent::BlockFinalized { .. } => {
                        metrics.chain.blocks_finalized.inc();
                    }
                    ChainEvent::AttestationReceived { .. } => {
                        metrics.chain.attestations_received.inc();
                    }
                    _ => {}
                }
            }
        });
    }

    // ---------------------------
    // Synthetic judgment feed
    // ---------------------------
    //
    // A real node receives judgments from the upstream evaluator; the demo
    // fabricates one per slot so the producer has something to bundle.

    {
        let chain = chain.clone();
        let period = cfg.consensus.slot_duration.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut n = 0u64;
            loop {
                interval.tick().await;
                let id = format!("demo-{}-{n}", clock::now_ms());
                let payload_cid = Cid(Hash256::compute(id.as_bytes()));
                let judgment =
                    JudgmentRef::new(id, payload_cid, (n % 101) as u8, Verdict::Wag);
                chain.lock().await.add_judgment(judgment);
                n += 1;
            }
        });
    }

    // ---------------------------
    // Slot ticker
    // ---------------------------

    let ticker = SlotTicker::spawn(chain.clone(), cfg.consensus.slot_duration);
    info!(
        "node {} producing with slot duration {:?}",
        cfg.node_id.as_str(),
        cfg.consensus.slot_duration
    );

    // ---------------------------
    // Shutdown
    // ---------------------------

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for ctrl-c: {e}"))?;
    info!("shutting down");
    ticker.stop().await;
    if let Some(exporter) = metrics_exporter {
        exporter.stop().await;
    }

    let chain = chain.lock().await;
    let stats = chain.get_stats();
    info!(
        "final state: height={} head_slot={} finalized_slot={} total_judgments={}",
        stats.height, stats.head_slot, stats.finalized_slot, stats.total_judgments
    );
    Ok(())
}
