//! Parser stage - raw frame bodies to parsed quotes
//!
//! A fixed pool of workers all read the raw channel concurrently. A worker
//! decodes both JSON layers; anything that fails (or carries an empty
//! `securityId`) goes to the dead channel with the original bytes intact.
//! No ordering is preserved across workers - the writer's send-time
//! aggregation is the only ordering that matters downstream.
//!
//! Workers exit when the raw channel closes, after draining it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossfire::{MAsyncRx, MAsyncTx};
use tokio::task::JoinHandle;

use bondfeed_protocol::{parse_quote, ParsedQuote};

/// Parser-pool metrics
#[derive(Debug, Default)]
struct ParserMetrics {
    frames_parsed: AtomicU64,
    frames_dead: AtomicU64,
}

/// Point-in-time view of the parser metrics
#[derive(Debug, Clone, Copy)]
pub struct ParserMetricsSnapshot {
    /// Frames decoded and handed to the writers
    pub frames_parsed: u64,
    /// Frames routed to the dead channel
    pub frames_dead: u64,
}

/// The parser worker pool
#[derive(Default)]
pub struct ParserPool {
    metrics: Arc<ParserMetrics>,
}

impl ParserPool {
    /// Create an idle pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Current metrics
    pub fn metrics_snapshot(&self) -> ParserMetricsSnapshot {
        ParserMetricsSnapshot {
            frames_parsed: self.metrics.frames_parsed.load(Ordering::Relaxed),
            frames_dead: self.metrics.frames_dead.load(Ordering::Relaxed),
        }
    }

    /// Spawn `count` workers, all consuming `raw_rx`.
    pub fn spawn_workers(
        &self,
        count: usize,
        raw_rx: MAsyncRx<Vec<u8>>,
        parsed_tx: MAsyncTx<ParsedQuote>,
        dead_tx: MAsyncTx<Vec<u8>>,
    ) -> Vec<JoinHandle<()>> {
        (0..count.max(1))
            .map(|worker_id| {
                let rx = raw_rx.clone();
                let parsed = parsed_tx.clone();
                let dead = dead_tx.clone();
                let metrics = Arc::clone(&self.metrics);
                tokio::spawn(async move {
                    run_worker(worker_id, rx, parsed, dead, metrics).await;
                })
            })
            .collect()
    }
}

async fn run_worker(
    worker_id: usize,
    raw_rx: MAsyncRx<Vec<u8>>,
    parsed_tx: MAsyncTx<ParsedQuote>,
    dead_tx: MAsyncTx<Vec<u8>>,
    metrics: Arc<ParserMetrics>,
) {
    tracing::debug!(worker_id, "parser worker starting");

    while let Ok(raw) = raw_rx.recv().await {
        match parse_quote(&raw) {
            Ok(quote) => {
                metrics.frames_parsed.fetch_add(1, Ordering::Relaxed);
                if parsed_tx.send(quote).await.is_err() {
                    tracing::warn!(worker_id, "parsed channel closed, parser exiting");
                    return;
                }
            }
            Err(e) => {
                metrics.frames_dead.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(worker_id, error = %e, bytes = raw.len(), "frame dead-lettered");
                if dead_tx.send(raw).await.is_err() {
                    tracing::warn!(worker_id, "dead channel closed, dropping frame");
                }
            }
        }
    }

    tracing::debug!(worker_id, "raw channel closed, parser exiting");
}
