//! Writer stage - batched transactional commits
//!
//! A pool of workers drains the parsed channel. Each worker owns a local
//! batch and flushes on any of: the batch reaching capacity, the flush
//! ticker firing, or the channel closing (final flush, then exit). Every
//! flush resolves today's table names fresh, so a batch that straddles
//! midnight lands in the tables of the day it commits.
//!
//! A failed commit is logged and the batch discarded - the upstream sends
//! newer quotes imminently and a retry storm would amplify an outage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Local;
use crossfire::MAsyncRx;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tokio::task::JoinHandle;

use bondfeed_protocol::ParsedQuote;

use crate::rows::{aggregate_batch, DetailRow, LatestRow};
use crate::tables::{detail_table_for, latest_table_for};
use crate::{Result, DETAIL_CHUNK_SIZE};

/// Writer-pool metrics
#[derive(Debug, Default)]
struct SinkMetrics {
    batches_committed: AtomicU64,
    batches_failed: AtomicU64,
    detail_rows_written: AtomicU64,
    latest_rows_written: AtomicU64,
}

/// Point-in-time view of the writer metrics
#[derive(Debug, Clone, Copy)]
pub struct SinkMetricsSnapshot {
    /// Batches committed successfully
    pub batches_committed: u64,
    /// Batches discarded after a failed commit
    pub batches_failed: u64,
    /// Detail rows inserted
    pub detail_rows_written: u64,
    /// Latest rows upserted
    pub latest_rows_written: u64,
}

/// The MySQL quote sink: owns the writer worker pool
pub struct QuoteSink {
    pool: MySqlPool,
    batch_size: usize,
    flush_delay: std::time::Duration,
    metrics: Arc<SinkMetrics>,
}

impl QuoteSink {
    /// Create a sink over the shared pool
    pub fn new(pool: MySqlPool, batch_size: usize, flush_delay: std::time::Duration) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
            flush_delay,
            metrics: Arc::new(SinkMetrics::default()),
        }
    }

    /// Current metrics
    pub fn metrics_snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            batches_committed: self.metrics.batches_committed.load(Ordering::Relaxed),
            batches_failed: self.metrics.batches_failed.load(Ordering::Relaxed),
            detail_rows_written: self.metrics.detail_rows_written.load(Ordering::Relaxed),
            latest_rows_written: self.metrics.latest_rows_written.load(Ordering::Relaxed),
        }
    }

    /// Spawn `count` writer workers all consuming `parsed_rx`.
    ///
    /// Workers exit after the channel closes and the final flush completes.
    pub fn spawn_workers(
        &self,
        count: usize,
        parsed_rx: MAsyncRx<ParsedQuote>,
    ) -> Vec<JoinHandle<()>> {
        (0..count.max(1))
            .map(|worker_id| {
                let pool = self.pool.clone();
                let rx = parsed_rx.clone();
                let metrics = Arc::clone(&self.metrics);
                let batch_size = self.batch_size;
                let flush_delay = self.flush_delay;
                tokio::spawn(async move {
                    run_worker(worker_id, pool, rx, metrics, batch_size, flush_delay).await;
                })
            })
            .collect()
    }
}

async fn run_worker(
    worker_id: usize,
    pool: MySqlPool,
    rx: MAsyncRx<ParsedQuote>,
    metrics: Arc<SinkMetrics>,
    batch_size: usize,
    flush_delay: std::time::Duration,
) {
    tracing::debug!(worker_id, batch_size, "writer worker starting");

    let mut batch: Vec<ParsedQuote> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_delay);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Ok(quote) => {
                        batch.push(quote);
                        if batch.len() >= batch_size {
                            flush(&pool, &mut batch, &metrics).await;
                        }
                    }
                    Err(_) => {
                        // Channel closed: final flush, then exit.
                        flush(&pool, &mut batch, &metrics).await;
                        tracing::debug!(worker_id, "writer worker draining complete");
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&pool, &mut batch, &metrics).await;
            }
        }
    }
}

/// Commit the batch, discarding it on failure. Empty batches are no-ops.
async fn flush(pool: &MySqlPool, batch: &mut Vec<ParsedQuote>, metrics: &SinkMetrics) {
    if batch.is_empty() {
        return;
    }
    let quotes: Vec<ParsedQuote> = batch.drain(..).collect();

    match commit(pool, &quotes).await {
        Ok((details, latests)) => {
            metrics.batches_committed.fetch_add(1, Ordering::Relaxed);
            metrics
                .detail_rows_written
                .fetch_add(details as u64, Ordering::Relaxed);
            metrics
                .latest_rows_written
                .fetch_add(latests as u64, Ordering::Relaxed);
            tracing::debug!(quotes = quotes.len(), details, latests, "batch committed");
        }
        Err(e) => {
            metrics.batches_failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                quotes = quotes.len(),
                error = %e,
                "batch commit failed, discarding"
            );
        }
    }
}

/// One transaction per batch: chunked detail inserts, then the latest
/// upsert. Returns the (detail, latest) row counts.
async fn commit(pool: &MySqlPool, quotes: &[ParsedQuote]) -> Result<(usize, usize)> {
    let (details, latests) = aggregate_batch(quotes)?;

    // Table names resolve at flush time, not batch-start time.
    let today = Local::now().date_naive();
    let detail_table = detail_table_for(today);
    let latest_table = latest_table_for(today);

    let mut tx = pool.begin().await?;

    for chunk in details.chunks(DETAIL_CHUNK_SIZE) {
        build_detail_insert(&detail_table, chunk)
            .build()
            .execute(&mut *tx)
            .await?;
    }

    if !latests.is_empty() {
        build_latest_upsert(&latest_table, &latests)
            .build()
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok((details.len(), latests.len()))
}

/// Batched INSERT for detail rows.
pub(crate) fn build_detail_insert<'a>(
    table: &str,
    rows: &'a [DetailRow],
) -> QueryBuilder<'a, MySql> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {table} (message_id, message_type, `timestamp`, security_id, \
         broker_id, side, price, `yield`, order_qty, min_trans_quantity, \
         quote_order_no, quote_time, settle_type, is_valid, is_tbd, create_time) "
    ));
    builder.push_values(rows, |mut b, row| {
        b.push_bind(&row.message_id)
            .push_bind(&row.message_type)
            .push_bind(row.timestamp)
            .push_bind(&row.security_id)
            .push_bind(&row.broker_id)
            .push_bind(&row.side)
            .push_bind(row.price)
            .push_bind(row.yield_rate)
            .push_bind(row.order_qty)
            .push_bind(row.min_trans_quantity)
            .push_bind(&row.quote_order_no)
            .push_bind(row.quote_time)
            .push_bind(&row.settle_type)
            .push_bind(&row.is_valid)
            .push_bind(&row.is_tbd)
            .push_bind(row.create_time);
    });
    builder
}

/// Upsert for the latest-quote winners.
///
/// The ON DUPLICATE KEY clause replaces every field only when the incoming
/// `send_time` beats the stored one; `send_time` itself is assigned last
/// because MySQL applies the assignments in order and later references see
/// the updated value.
pub(crate) fn build_latest_upsert<'a>(
    table: &str,
    rows: &'a [LatestRow],
) -> QueryBuilder<'a, MySql> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {table} (security_id, raw_json, message_id, message_type, \
         send_time, `timestamp`, last_update_time) "
    ));
    builder.push_values(rows, |mut b, row| {
        b.push_bind(&row.security_id)
            .push_bind(&row.raw_json)
            .push_bind(&row.message_id)
            .push_bind(&row.message_type)
            .push_bind(row.send_time)
            .push_bind(row.timestamp)
            .push_bind(row.last_update_time);
    });
    builder.push(
        " ON DUPLICATE KEY UPDATE \
         raw_json = IF(VALUES(send_time) > send_time, VALUES(raw_json), raw_json), \
         message_id = IF(VALUES(send_time) > send_time, VALUES(message_id), message_id), \
         message_type = IF(VALUES(send_time) > send_time, VALUES(message_type), message_type), \
         `timestamp` = IF(VALUES(send_time) > send_time, VALUES(`timestamp`), `timestamp`), \
         last_update_time = IF(VALUES(send_time) > send_time, VALUES(last_update_time), last_update_time), \
         send_time = IF(VALUES(send_time) > send_time, VALUES(send_time), send_time)",
    );
    builder
}
