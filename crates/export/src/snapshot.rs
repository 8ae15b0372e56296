//! Snapshot exporter - latest table to spreadsheet to download link
//!
//! Column layout (fixed):
//!
//! ```text
//! A    securityId
//! B-E  bid price / yield / quantity / quote time
//! F-I  ask price / yield / quantity / quote time
//! J-N  messageId, messageType, sendTime, timestamp, lastUpdateTime
//! O    bid brokerId
//! P    ask brokerId
//! ```
//!
//! One sheet row per bid/ask pair, padded to the longer of the two arrays;
//! an instrument with no prices still gets one metadata-only row.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use rust_xlsxwriter::{Workbook, Worksheet};
use sqlx::MySqlPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bondfeed_config::ExportConfig;
use bondfeed_protocol::{parse_quote, PriceEntry};
use bondfeed_storage::{fetch_latest, latest_table_for, LatestRow};

use crate::{Notifier, OssClient, Result, UPLOAD_CATEGORY};

/// Sheet name for the latest-quote snapshot
pub const SHEET_NAME: &str = "债券最新行情";

const COLUMN_HEADERS: [&str; 16] = [
    "债券代码",
    "买方价格",
    "买方收益率",
    "买方数量",
    "买方报价时间",
    "卖方价格",
    "卖方收益率",
    "卖方数量",
    "卖方报价时间",
    "消息ID",
    "消息类型",
    "发送时间",
    "时间戳",
    "更新时间",
    "买方券商ID",
    "卖方券商ID",
];

const COLUMN_WIDTH: f64 = 18.0;

/// One spreadsheet row
#[derive(Debug, Clone)]
pub(crate) struct SheetRow {
    pub security_id: String,
    pub bid: Option<SideCells>,
    pub ask: Option<SideCells>,
    pub message_id: String,
    pub message_type: String,
    pub send_time: i64,
    pub timestamp: i64,
    pub last_update_time: NaiveDateTime,
}

/// The per-side cell group
#[derive(Debug, Clone)]
pub(crate) struct SideCells {
    pub price: f64,
    pub yield_rate: f64,
    pub order_qty: f64,
    pub quote_time: i64,
    pub broker_id: String,
}

impl From<&PriceEntry> for SideCells {
    fn from(entry: &PriceEntry) -> Self {
        Self {
            price: entry.price,
            yield_rate: entry.yield_rate,
            order_qty: entry.order_qty,
            quote_time: entry.quote_time,
            broker_id: entry.broker_id.clone(),
        }
    }
}

/// Expand latest-table rows into sheet rows.
///
/// Rows whose stored envelope no longer parses are logged and skipped; one
/// bad row never aborts the snapshot.
pub(crate) fn build_rows(latest: &[LatestRow]) -> Vec<SheetRow> {
    let mut rows = Vec::with_capacity(latest.len());

    for record in latest {
        let parsed = match parse_quote(record.raw_json.as_bytes()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(
                    security_id = %record.security_id,
                    error = %e,
                    "stored envelope no longer parses, skipping row"
                );
                continue;
            }
        };

        let bids = &parsed.payload.bid_prices;
        let asks = &parsed.payload.ask_prices;
        let pair_count = bids.len().max(asks.len());

        let base = |bid: Option<SideCells>, ask: Option<SideCells>| SheetRow {
            security_id: record.security_id.clone(),
            bid,
            ask,
            message_id: record.message_id.clone(),
            message_type: record.message_type.clone(),
            send_time: record.send_time,
            timestamp: record.timestamp,
            last_update_time: record.last_update_time,
        };

        if pair_count == 0 {
            rows.push(base(None, None));
            continue;
        }
        for i in 0..pair_count {
            rows.push(base(
                bids.get(i).map(SideCells::from),
                asks.get(i).map(SideCells::from),
            ));
        }
    }

    rows
}

/// `YYYY-MM-DD HH:MM:SS.mmm` from epoch milliseconds
pub(crate) fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

fn format_naive(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Write the workbook for `rows` at `path`.
pub(crate) fn write_workbook(path: &Path, rows: &[SheetRow]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in COLUMN_HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
        worksheet.set_column_width(col as u16, COLUMN_WIDTH)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_string(r, 0, row.security_id.as_str())?;

        if let Some(bid) = &row.bid {
            write_side(worksheet, r, 1, bid)?;
            worksheet.write_string(r, 14, bid.broker_id.as_str())?;
        }
        if let Some(ask) = &row.ask {
            write_side(worksheet, r, 5, ask)?;
            worksheet.write_string(r, 15, ask.broker_id.as_str())?;
        }

        worksheet.write_string(r, 9, row.message_id.as_str())?;
        worksheet.write_string(r, 10, row.message_type.as_str())?;
        worksheet.write_string(r, 11, format_millis(row.send_time).as_str())?;
        worksheet.write_string(r, 12, format_millis(row.timestamp).as_str())?;
        worksheet.write_string(r, 13, format_naive(row.last_update_time).as_str())?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_side(
    worksheet: &mut Worksheet,
    row: u32,
    first_col: u16,
    side: &SideCells,
) -> Result<()> {
    worksheet.write_number(row, first_col, side.price)?;
    worksheet.write_number(row, first_col + 1, side.yield_rate)?;
    worksheet.write_number(row, first_col + 2, side.order_qty)?;
    worksheet.write_string(row, first_col + 3, format_millis(side.quote_time).as_str())?;
    Ok(())
}

/// The scheduled exporter
pub struct SnapshotExporter {
    pool: MySqlPool,
    config: ExportConfig,
    oss: OssClient,
    notifier: Notifier,
}

impl SnapshotExporter {
    /// Create an exporter over the shared pool
    pub fn new(
        pool: MySqlPool,
        config: ExportConfig,
        oss: OssClient,
        notifier: Notifier,
    ) -> Self {
        Self {
            pool,
            config,
            oss,
            notifier,
        }
    }

    /// Spawn the scheduler: one snapshot per configured interval until
    /// cancelled. Failures are logged; the ticker keeps going.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.config.interval());
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the immediate first tick so a restart loop cannot spam
            // exports.
            tick.tick().await;

            tracing::info!(
                interval_minutes = self.config.interval_minutes,
                path = %self.config.path,
                "snapshot exporter started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("snapshot exporter stopping");
                        return;
                    }
                    _ = tick.tick() => {}
                }
                match self.export_once().await {
                    Ok(url) => tracing::info!(url = %url, "snapshot exported"),
                    Err(e) => tracing::error!(error = %e, "snapshot export failed"),
                }
            }
        })
    }

    /// One full snapshot cycle; returns the download URL.
    pub async fn export_once(&self) -> Result<String> {
        let table = latest_table_for(Local::now().date_naive());
        let latest = fetch_latest(&self.pool, &table).await?;
        tracing::debug!(table = %table, rows = latest.len(), "building snapshot");

        let rows = build_rows(&latest);
        let file_path = self.staging_path();
        tokio::fs::create_dir_all(&self.config.path).await?;
        write_workbook(&file_path, &rows)?;

        let bytes = tokio::fs::read(&file_path).await?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bond_latest_quotes.xlsx".to_string());

        let headers = [
            ("x-request-id", Uuid::new_v4().to_string()),
            ("x-origin-service", self.config.origin_service.clone()),
            ("x-uin", self.config.uin.clone()),
        ];
        let uploaded = self
            .oss
            .upload(UPLOAD_CATEGORY, &file_name, bytes, &headers)
            .await?;

        let message = format!(
            "{} bond latest quotes export\ndownload: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            uploaded.url
        );
        self.notifier.send_text(&message).await?;

        if let Err(e) = tokio::fs::remove_file(&file_path).await {
            tracing::warn!(path = %file_path.display(), error = %e, "failed to delete staging file");
        }
        Ok(uploaded.url)
    }

    fn staging_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        Path::new(&self.config.path).join(format!("bond_latest_quotes_{stamp}.xlsx"))
    }
}
