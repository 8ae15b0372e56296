//! Bondfeed Storage - MySQL persistence for the quote pipeline
//!
//! Two tables per day hold the ingested stream:
//! - `t_bond_quote_detail_YYYYMMDD` - append-only ledger, one row per
//!   bid/ask entry
//! - `t_bond_latest_quote_YYYYMMDD` - one row per instrument, last writer
//!   wins by envelope `sendTime`
//!
//! [`TableManager`] creates the dated pairs ahead of use by cloning schema
//! templates; [`QuoteSink`] runs the writer workers that drain the parsed
//! channel and commit transactional batches.

mod error;
mod rows;
mod tables;
mod writer;

pub use error::StorageError;
pub use rows::{aggregate_batch, fetch_latest, DetailRow, LatestRow};
pub use tables::{detail_table_for, latest_table_for, week_dates, TableManager};
pub use writer::{QuoteSink, SinkMetricsSnapshot};

use bondfeed_config::DatabaseConfig;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Rows per INSERT statement when writing detail batches
pub const DETAIL_CHUNK_SIZE: usize = 1000;

/// Open the shared connection pool.
///
/// The pool is cloned into every writer worker; sqlx manages per-connection
/// prepared-statement caching and there is no implicit transaction, so the
/// flush owns the transaction boundary.
pub async fn connect(config: &DatabaseConfig) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .max_lifetime(config.conn_max_lifetime())
        .connect(&config.url())
        .await?;
    tracing::info!(
        host = %config.host,
        schema = %config.schema,
        max_connections = config.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod rows_test;
