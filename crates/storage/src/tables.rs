//! Dated table lifecycle
//!
//! Detail and latest tables are physical per-day tables named by date
//! suffix. On startup the schema templates are created if absent, then the
//! dated pair for every day from today through the following Monday
//! inclusive is cloned from them with `CREATE TABLE IF NOT EXISTS .. LIKE`.
//! A weekly task repeats the clone pass each Monday at midnight.
//!
//! Resolvers format names from the current date on every call - a flush
//! that crosses midnight lands in the new day's tables.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, Days, Local, NaiveDate};
use sqlx::MySqlPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Result, StorageError};

/// Schema template for the detail ledger
pub const DETAIL_TEMPLATE: &str = "t_bond_quote_detail";

/// Schema template for the latest-quote table
pub const LATEST_TEMPLATE: &str = "t_bond_latest_quote";

const DETAIL_TEMPLATE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS t_bond_quote_detail (
    id BIGINT NOT NULL AUTO_INCREMENT,
    message_id VARCHAR(64) NOT NULL,
    message_type VARCHAR(64) NOT NULL,
    `timestamp` BIGINT NOT NULL,
    security_id VARCHAR(32) NOT NULL,
    broker_id VARCHAR(64) NOT NULL,
    side VARCHAR(8) NOT NULL,
    price DECIMAL(18,6) NOT NULL,
    `yield` DECIMAL(18,6) NULL,
    order_qty DECIMAL(18,2) NOT NULL,
    min_trans_quantity DECIMAL(18,2) NULL,
    quote_order_no VARCHAR(64) NOT NULL,
    quote_time DATETIME(3) NOT NULL,
    settle_type VARCHAR(16) NULL,
    is_valid CHAR(1) NULL,
    is_tbd CHAR(1) NULL,
    create_time DATETIME(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
    PRIMARY KEY (id),
    KEY idx_security_id (security_id),
    KEY idx_quote_time (quote_time),
    KEY idx_message_id (message_id)
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4";

const LATEST_TEMPLATE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS t_bond_latest_quote (
    security_id VARCHAR(32) NOT NULL,
    raw_json TEXT NOT NULL,
    message_id VARCHAR(64) NOT NULL,
    message_type VARCHAR(64) NOT NULL,
    send_time BIGINT NOT NULL,
    `timestamp` BIGINT NOT NULL,
    last_update_time DATETIME(3) NOT NULL,
    PRIMARY KEY (security_id),
    KEY idx_send_time (send_time)
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4";

/// Detail table name for a given date
pub fn detail_table_for(date: NaiveDate) -> String {
    format!("{DETAIL_TEMPLATE}_{}", date.format("%Y%m%d"))
}

/// Latest table name for a given date
pub fn latest_table_for(date: NaiveDate) -> String {
    format!("{LATEST_TEMPLATE}_{}", date.format("%Y%m%d"))
}

/// Dates from `from` through the following Monday, inclusive.
///
/// Called on a Monday this spans eight days (that Monday through the next).
pub fn week_dates(from: NaiveDate) -> Vec<NaiveDate> {
    let until_monday = days_until_next_monday(from);
    (0..=until_monday)
        .filter_map(|offset| from.checked_add_days(Days::new(offset)))
        .collect()
}

fn days_until_next_monday(from: NaiveDate) -> u64 {
    let since_monday = from.weekday().num_days_from_monday() as u64;
    7 - since_monday
}

/// The next Monday strictly after `from`
pub fn next_monday(from: NaiveDate) -> NaiveDate {
    from.checked_add_days(Days::new(days_until_next_monday(from)))
        .unwrap_or(from)
}

/// Creates and resolves the dated table pairs
pub struct TableManager {
    pool: MySqlPool,
    known: std::sync::RwLock<HashSet<String>>,
}

impl TableManager {
    /// Create a manager over the shared pool
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            known: std::sync::RwLock::new(HashSet::new()),
        }
    }

    /// Today's detail table name (resolved fresh per call)
    pub fn today_detail_table(&self) -> String {
        detail_table_for(Local::now().date_naive())
    }

    /// Today's latest table name (resolved fresh per call)
    pub fn today_latest_table(&self) -> String {
        latest_table_for(Local::now().date_naive())
    }

    /// Startup pass: create the schema templates, then this week's dated
    /// pairs. Failing to create today's tables is fatal; later days only
    /// log, the weekly task will retry them.
    pub async fn ensure_startup(&self) -> Result<()> {
        self.exec_ddl(DETAIL_TEMPLATE, DETAIL_TEMPLATE_DDL).await?;
        self.exec_ddl(LATEST_TEMPLATE, LATEST_TEMPLATE_DDL).await?;

        let today = Local::now().date_naive();
        self.create_pair(today).await?;

        for date in week_dates(today).into_iter().skip(1) {
            if let Err(e) = self.create_pair(date).await {
                tracing::warn!(date = %date, error = %e, "failed to pre-create dated tables");
            }
        }
        Ok(())
    }

    /// Create the dated pair for every date in `from`'s week window.
    pub async fn create_week(&self, from: NaiveDate) -> Result<()> {
        for date in week_dates(from) {
            self.create_pair(date).await?;
        }
        Ok(())
    }

    /// Create one day's detail+latest pair by cloning the templates.
    /// Idempotent; known-created names are skipped via the cache.
    pub async fn create_pair(&self, date: NaiveDate) -> Result<()> {
        let detail = detail_table_for(date);
        let latest = latest_table_for(date);

        self.clone_table(&detail, DETAIL_TEMPLATE).await?;
        self.clone_table(&latest, LATEST_TEMPLATE).await?;
        tracing::info!(detail = %detail, latest = %latest, "dated tables ready");
        Ok(())
    }

    async fn clone_table(&self, table: &str, template: &str) -> Result<()> {
        if self.is_known(table) {
            return Ok(());
        }
        let ddl = format!("CREATE TABLE IF NOT EXISTS {table} LIKE {template}");
        self.exec_ddl(table, &ddl).await?;
        self.mark_known(table);
        Ok(())
    }

    async fn exec_ddl(&self, table: &str, ddl: &str) -> Result<()> {
        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|source| StorageError::TableCreate {
                table: table.to_string(),
                source,
            })?;
        Ok(())
    }

    fn is_known(&self, table: &str) -> bool {
        self.known
            .read()
            .map(|set| set.contains(table))
            .unwrap_or(false)
    }

    fn mark_known(&self, table: &str) {
        if let Ok(mut set) = self.known.write() {
            set.insert(table.to_string());
        }
    }

    /// Spawn the weekly creation task: sleeps until each upcoming Monday
    /// 00:00 local and clones that week's tables. Create failures are
    /// logged and retried on the next tick.
    pub fn spawn_weekly(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let now = Local::now();
                let monday = next_monday(now.date_naive());
                let wake = monday
                    .and_hms_opt(0, 0, 0)
                    .and_then(|naive| naive.and_local_timezone(Local).single())
                    .unwrap_or(now);
                let wait = (wake - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(60));

                tracing::info!(
                    next_monday = %monday,
                    wait_secs = wait.as_secs(),
                    "weekly table creation scheduled"
                );

                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("weekly table task stopping");
                        return;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                if let Err(e) = manager.create_week(monday).await {
                    tracing::error!(error = %e, "weekly table creation failed, will retry next tick");
                }
            }
        })
    }
}
