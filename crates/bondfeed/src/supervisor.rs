//! Supervisor - wires the pipeline and owns the session lifecycle
//!
//! Everything except the gateway session is spawned exactly once: the
//! parser pool, the writer pool, the dead-letter drain, the weekly table
//! task, and the snapshot exporter all run until shutdown. Sessions come
//! and go: on a failure event the supervisor waits the configured backoff
//! and spawns a fresh one, handing it a clone of the same raw sender, so
//! the worker pools and channel capacities are untouched by reconnects.
//!
//! Shutdown drains front to back: cancel the session, drop the raw sender,
//! let the parsers drain and exit (closing the parsed channel), let the
//! writers run their final flush, then join everything.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bondfeed_config::Config;
use bondfeed_export::{Notifier, OssClient, SnapshotExporter};
use bondfeed_gateway::{GatewaySession, SessionEvent};
use bondfeed_pipeline::{channels, spawn_dead_letter_drain, ParserPool, PipelineChannels};
use bondfeed_storage::{QuoteSink, TableManager};

/// Run the service until a shutdown signal or a fatal error.
pub async fn run(config: Config) -> Result<()> {
    let pool = bondfeed_storage::connect(&config.database)
        .await
        .context("database connection failed")?;

    // Today's tables must exist before the first flush.
    let tables = Arc::new(TableManager::new(pool.clone()));
    tables
        .ensure_startup()
        .await
        .context("startup table creation failed")?;

    let shutdown = CancellationToken::new();
    let process = &config.process;

    let PipelineChannels {
        raw_tx,
        raw_rx,
        parsed_tx,
        parsed_rx,
        dead_tx,
        dead_rx,
    } = channels(
        process.raw_buffer_size,
        process.parsed_buffer_size,
        process.dead_buffer_size,
    );

    // Stage tasks; each pool owns its channel ends after these calls.
    let parser_pool = ParserPool::new();
    let parser_handles =
        parser_pool.spawn_workers(process.parser_workers, raw_rx, parsed_tx, dead_tx);

    let sink = QuoteSink::new(pool.clone(), process.batch_size, process.flush_delay());
    let writer_handles = sink.spawn_workers(process.db_workers, parsed_rx);

    let drain_handle = spawn_dead_letter_drain(dead_rx);
    let weekly_handle = tables.spawn_weekly(shutdown.clone());

    let oss = OssClient::new(config.export.oss_url.clone(), config.export.timeout())?;
    let notifier = Notifier::new(config.notify.clone())?;
    let exporter_handle =
        SnapshotExporter::new(pool.clone(), config.export.clone(), oss, notifier)
            .spawn(shutdown.clone());

    tracing::info!(
        parser_workers = process.parser_workers,
        db_workers = process.db_workers,
        raw_buffer = process.raw_buffer_size,
        parsed_buffer = process.parsed_buffer_size,
        "pipeline started"
    );

    // Session lifecycle: spawn, watch events, restart with backoff.
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(8);
    let mut session_handle = GatewaySession::new(
        config.gateway.clone(),
        raw_tx.clone(),
        event_tx.clone(),
        shutdown.clone(),
    )
    .spawn();

    let max_attempts = config.gateway.max_reconnect_attempts;
    let backoff = config.gateway.reconnect_interval();
    let mut attempts: u32 = 0;
    let mut fatal: Option<String> = None;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "signal listener failed, shutting down");
                }
                tracing::info!("shutdown signal received");
                break;
            }
            event = event_rx.recv() => {
                match event {
                    Some(SessionEvent::Subscribed) => {
                        attempts = 0;
                        tracing::info!("session subscribed, quote stream live");
                    }
                    Some(SessionEvent::Failed(e)) => {
                        attempts += 1;
                        if max_attempts > 0 && attempts > max_attempts {
                            fatal = Some(format!(
                                "session failed {attempts} times, last error: {e}"
                            ));
                            break;
                        }
                        tracing::warn!(
                            error = %e,
                            attempt = attempts,
                            backoff_ms = backoff.as_millis() as u64,
                            "session failed, restarting after backoff"
                        );
                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => {
                                tracing::info!("shutdown signal received during backoff");
                                break;
                            }
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        session_handle = GatewaySession::new(
                            config.gateway.clone(),
                            raw_tx.clone(),
                            event_tx.clone(),
                            shutdown.clone(),
                        )
                        .spawn();
                    }
                    None => break,
                }
            }
        }
    }

    // Ordered drain: session first, then front-to-back through the stages.
    shutdown.cancel();
    let _ = session_handle.await;
    drop(raw_tx);
    drop(event_tx);

    for handle in parser_handles {
        let _ = handle.await;
    }
    tracing::info!("parsers drained");

    for handle in writer_handles {
        let _ = handle.await;
    }
    tracing::info!(
        batches = sink.metrics_snapshot().batches_committed,
        detail_rows = sink.metrics_snapshot().detail_rows_written,
        "writers drained"
    );

    let dead_total = drain_handle.await.unwrap_or(0);
    let _ = weekly_handle.await;
    let _ = exporter_handle.await;

    tracing::info!(
        frames_parsed = parser_pool.metrics_snapshot().frames_parsed,
        frames_dead = dead_total,
        "shutdown complete"
    );

    if let Some(reason) = fatal {
        bail!("reconnect attempts exhausted: {reason}");
    }
    Ok(())
}
