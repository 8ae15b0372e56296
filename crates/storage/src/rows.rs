//! Row types and batch aggregation
//!
//! [`aggregate_batch`] turns a writer batch of parsed quotes into the two
//! row sets a flush commits: flattened detail rows (one per bid/ask entry)
//! and the per-instrument winners for the latest-quote upsert. Aggregation
//! is pure so the ordering invariants can be tested without a database.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, MySqlPool};

use bondfeed_protocol::{ParsedQuote, PriceEntry};

use crate::Result;

/// One row of the append-only detail ledger
#[derive(Debug, Clone)]
pub struct DetailRow {
    /// Upstream message identifier
    pub message_id: String,
    /// Upstream message type
    pub message_type: String,
    /// Business timestamp from the envelope, milliseconds
    pub timestamp: i64,
    /// Instrument identifier
    pub security_id: String,
    /// Quoting broker
    pub broker_id: String,
    /// `BID` or `ASK`
    pub side: String,
    /// Clean price
    pub price: f64,
    /// Yield, percent
    pub yield_rate: Option<f64>,
    /// Quoted quantity
    pub order_qty: f64,
    /// Minimum transactable quantity
    pub min_trans_quantity: Option<f64>,
    /// Quote order number
    pub quote_order_no: String,
    /// Quote time decoded from milliseconds
    pub quote_time: NaiveDateTime,
    /// Settlement convention
    pub settle_type: Option<String>,
    /// `Y`/`N` validity marker
    pub is_valid: Option<String>,
    /// `Y`/`N` to-be-determined marker
    pub is_tbd: Option<String>,
    /// Row insertion time
    pub create_time: NaiveDateTime,
}

/// One row of the per-instrument latest-quote table
#[derive(Debug, Clone, FromRow)]
pub struct LatestRow {
    /// Instrument identifier (primary key)
    pub security_id: String,
    /// Full envelope serialized back to JSON
    pub raw_json: String,
    /// Upstream message identifier
    pub message_id: String,
    /// Upstream message type
    pub message_type: String,
    /// Envelope send time, milliseconds
    pub send_time: i64,
    /// Business timestamp, milliseconds
    pub timestamp: i64,
    /// Materialized from `send_time`; the table invariant is that this is
    /// the maximum send time ever committed for the key
    pub last_update_time: NaiveDateTime,
}

/// Milliseconds since epoch to a naive UTC timestamp; out-of-range values
/// clamp to the epoch rather than poisoning the batch.
fn millis_to_naive(ms: i64) -> NaiveDateTime {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.naive_utc())
}

fn none_if_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn detail_from_entry(quote: &ParsedQuote, entry: &PriceEntry, now: NaiveDateTime) -> DetailRow {
    DetailRow {
        message_id: quote.envelope.data.message_id.clone(),
        message_type: quote.envelope.data.message_type.clone(),
        timestamp: quote.envelope.data.timestamp,
        security_id: quote.payload.security_id.clone(),
        broker_id: entry.broker_id.clone(),
        side: entry.side.clone(),
        price: entry.price,
        yield_rate: Some(entry.yield_rate),
        order_qty: entry.order_qty,
        min_trans_quantity: Some(entry.min_trans_quantity),
        quote_order_no: entry.quote_order_no.clone(),
        quote_time: millis_to_naive(entry.quote_time),
        settle_type: none_if_empty(&entry.settle_type),
        is_valid: none_if_empty(&entry.is_valid),
        is_tbd: none_if_empty(&entry.is_tbd),
        create_time: now,
    }
}

/// Flatten a writer batch into detail rows and latest-quote winners.
///
/// Details: one row per ask entry plus one per bid entry, in batch order.
/// Latest: the batch is grouped by `securityId` and the quote with the
/// greatest `sendTime` in each group becomes that group's row; ties keep
/// the earlier quote. Results are sorted by key for deterministic SQL.
pub fn aggregate_batch(batch: &[ParsedQuote]) -> Result<(Vec<DetailRow>, Vec<LatestRow>)> {
    let now = Utc::now().naive_utc();

    let mut details = Vec::new();
    let mut latest: HashMap<&str, &ParsedQuote> = HashMap::new();

    for quote in batch {
        for ask in &quote.payload.ask_prices {
            details.push(detail_from_entry(quote, ask, now));
        }
        for bid in &quote.payload.bid_prices {
            details.push(detail_from_entry(quote, bid, now));
        }

        latest
            .entry(quote.payload.security_id.as_str())
            .and_modify(|held| {
                if quote.envelope.send_time > held.envelope.send_time {
                    *held = quote;
                }
            })
            .or_insert(quote);
    }

    let mut winners: Vec<LatestRow> = Vec::with_capacity(latest.len());
    for (security_id, quote) in latest {
        winners.push(LatestRow {
            security_id: security_id.to_string(),
            raw_json: quote.raw_json()?,
            message_id: quote.envelope.data.message_id.clone(),
            message_type: quote.envelope.data.message_type.clone(),
            send_time: quote.envelope.send_time,
            timestamp: quote.envelope.data.timestamp,
            last_update_time: millis_to_naive(quote.envelope.send_time),
        });
    }
    winners.sort_by(|a, b| a.security_id.cmp(&b.security_id));

    Ok((details, winners))
}

/// Read every row of a latest-quote table (used by the snapshot exporter).
pub async fn fetch_latest(pool: &MySqlPool, table: &str) -> Result<Vec<LatestRow>> {
    let sql = format!(
        "SELECT security_id, raw_json, message_id, message_type, send_time, \
         `timestamp`, last_update_time FROM {table} ORDER BY security_id"
    );
    let rows = sqlx::query_as::<_, LatestRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}
