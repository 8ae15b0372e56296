//! Snapshot sheet-building tests

use chrono::{DateTime, Utc};

use bondfeed_storage::LatestRow;

use crate::snapshot::{build_rows, format_millis, write_workbook};

fn raw_envelope(security_id: &str, send_time: i64, asks: usize, bids: usize) -> String {
    let entry = |side: &str, i: usize| {
        format!(
            r#"{{"brokerId":"{side}-broker-{i}","isTbd":"N","isValid":"Y","minTransQuantity":1000000,"orderQty":14000000,"price":9{i}.35,"quoteOrderNo":"Q{i}","quoteTime":1751607138931,"securityId":"{security_id}","settleType":"T2","side":"{side}","yield":9.1{i}}}"#
        )
    };
    let asks: Vec<String> = (0..asks).map(|i| entry("ASK", i)).collect();
    let bids: Vec<String> = (0..bids).map(|i| entry("BID", i)).collect();
    let inner = format!(
        r#"{{"askPrices":[{}],"bidPrices":[{}],"securityId":"{security_id}"}}"#,
        asks.join(","),
        bids.join(",")
    );
    serde_json::json!({
        "data": {
            "data": inner,
            "messageId": "M1",
            "messageType": "BOND_ORDER_BOOK_MSG",
            "timestamp": send_time - 4,
        },
        "sendTime": send_time,
        "wsMessageType": "ATS_QUOTE",
    })
    .to_string()
}

fn latest_row(security_id: &str, send_time: i64, asks: usize, bids: usize) -> LatestRow {
    LatestRow {
        security_id: security_id.to_string(),
        raw_json: raw_envelope(security_id, send_time, asks, bids),
        message_id: "M1".to_string(),
        message_type: "BOND_ORDER_BOOK_MSG".to_string(),
        send_time,
        timestamp: send_time - 4,
        last_update_time: DateTime::<Utc>::from_timestamp_millis(send_time)
            .unwrap()
            .naive_utc(),
    }
}

#[test]
fn test_row_per_longer_side() {
    // 1 ask, 3 bids: three sheet rows, asks exhausted after the first.
    let rows = build_rows(&[latest_row("HK0000108958", 1751607140494, 1, 3)]);

    assert_eq!(rows.len(), 3);
    assert!(rows[0].ask.is_some());
    assert!(rows[0].bid.is_some());
    assert!(rows[1].ask.is_none());
    assert!(rows[1].bid.is_some());
    assert!(rows[2].ask.is_none());
    assert_eq!(rows[0].security_id, "HK0000108958");
    assert_eq!(rows[0].ask.as_ref().unwrap().broker_id, "ASK-broker-0");
    assert_eq!(rows[2].bid.as_ref().unwrap().broker_id, "BID-broker-2");
}

#[test]
fn test_metadata_only_row_for_empty_prices() {
    let rows = build_rows(&[latest_row("X", 1000, 0, 0)]);

    assert_eq!(rows.len(), 1);
    assert!(rows[0].bid.is_none());
    assert!(rows[0].ask.is_none());
    assert_eq!(rows[0].security_id, "X");
    assert_eq!(rows[0].send_time, 1000);
}

#[test]
fn test_unparseable_raw_json_is_skipped() {
    let mut bad = latest_row("BAD", 1, 1, 1);
    bad.raw_json = "{broken".to_string();
    let good = latest_row("GOOD", 2, 1, 1);

    let rows = build_rows(&[bad, good]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].security_id, "GOOD");
}

#[test]
fn test_format_millis() {
    assert_eq!(format_millis(1751607140494), "2025-07-04 05:32:20.494");
    assert_eq!(format_millis(0), "1970-01-01 00:00:00.000");
}

#[test]
fn test_write_workbook_produces_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("snapshot.xlsx");

    let rows = build_rows(&[
        latest_row("HK0000108958", 1751607140494, 1, 1),
        latest_row("X", 1000, 0, 0),
    ]);
    write_workbook(&path, &rows).expect("write workbook");

    let meta = std::fs::metadata(&path).expect("file exists");
    assert!(meta.len() > 0, "workbook must not be empty");
}

#[test]
fn test_write_workbook_accepts_empty_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.xlsx");
    write_workbook(&path, &[]).expect("write workbook");
    assert!(path.exists());
}
