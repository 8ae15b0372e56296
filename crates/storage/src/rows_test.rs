//! Aggregation tests - the ordering invariants without a database

use bondfeed_protocol::{parse_quote, ParsedQuote};

use crate::rows::aggregate_batch;

fn quote(security_id: &str, send_time: i64, asks: usize, bids: usize) -> ParsedQuote {
    let entry = |side: &str, i: usize| {
        format!(
            r#"{{"brokerId":"B{i}","isTbd":"N","isValid":"Y","minTransQuantity":1000000,"orderQty":14000000,"price":91.35,"quoteOrderNo":"Q{i}","quoteTime":1751607138931,"securityId":"{security_id}","settleType":"T2","side":"{side}","yield":9.11}}"#
        )
    };
    let asks: Vec<String> = (0..asks).map(|i| entry("ASK", i)).collect();
    let bids: Vec<String> = (0..bids).map(|i| entry("BID", i)).collect();
    let inner = format!(
        r#"{{"askPrices":[{}],"bidPrices":[{}],"securityId":"{security_id}"}}"#,
        asks.join(","),
        bids.join(",")
    );
    let raw = serde_json::json!({
        "data": {
            "data": inner,
            "messageId": format!("M-{send_time}"),
            "messageType": "BOND_ORDER_BOOK_MSG",
            "organization": "AF",
            "receiverId": security_id,
            "timestamp": send_time - 4,
        },
        "sendTime": send_time,
        "wsMessageType": "ATS_QUOTE",
    });
    parse_quote(raw.to_string().as_bytes()).expect("fixture parses")
}

#[test]
fn test_detail_rows_equal_ask_plus_bid_count() {
    let batch = vec![
        quote("HK0000108958", 1751607140494, 1, 1),
        quote("HK0000098928", 1751607144053, 0, 3),
        quote("HK0000096021", 1751607145000, 2, 0),
    ];
    let (details, _) = aggregate_batch(&batch).expect("aggregate");
    assert_eq!(details.len(), 2 + 3 + 2);
}

#[test]
fn test_single_quote_produces_expected_rows() {
    let batch = vec![quote("HK0000108958", 1751607140494, 1, 1)];
    let (details, latests) = aggregate_batch(&batch).expect("aggregate");

    assert_eq!(details.len(), 2);
    assert_eq!(details[0].side, "ASK");
    assert_eq!(details[1].side, "BID");
    assert_eq!(details[0].security_id, "HK0000108958");
    assert_eq!(details[0].message_id, "M-1751607140494");
    assert_eq!(details[0].settle_type.as_deref(), Some("T2"));
    assert_eq!(details[0].is_valid.as_deref(), Some("Y"));

    assert_eq!(latests.len(), 1);
    let latest = &latests[0];
    assert_eq!(latest.security_id, "HK0000108958");
    assert_eq!(latest.send_time, 1751607140494);
    // last_update_time materializes from the send time.
    assert_eq!(
        latest.last_update_time.and_utc().timestamp_millis(),
        1751607140494
    );
    // raw_json round-trips through the envelope.
    let reparsed = parse_quote(latest.raw_json.as_bytes()).expect("raw_json parses");
    assert_eq!(reparsed.envelope.send_time, 1751607140494);
}

#[test]
fn test_last_writer_wins_within_batch() {
    // Later send time arrives first in the batch: order must not matter.
    let batch = vec![quote("HK0000108958", 100, 1, 0), quote("HK0000108958", 90, 0, 1)];
    let (details, latests) = aggregate_batch(&batch).expect("aggregate");

    assert_eq!(details.len(), 2, "both quotes keep their detail rows");
    assert_eq!(latests.len(), 1);
    assert_eq!(latests[0].send_time, 100);
    assert_eq!(latests[0].message_id, "M-100");
}

#[test]
fn test_last_writer_wins_any_order() {
    let batch = vec![quote("K1", 90, 1, 0), quote("K1", 100, 1, 0)];
    let (_, latests) = aggregate_batch(&batch).expect("aggregate");
    assert_eq!(latests[0].send_time, 100);
}

#[test]
fn test_empty_arrays_still_produce_latest() {
    let batch = vec![quote("X", 1000, 0, 0)];
    let (details, latests) = aggregate_batch(&batch).expect("aggregate");

    assert!(details.is_empty());
    assert_eq!(latests.len(), 1);
    assert_eq!(latests[0].security_id, "X");
    assert_eq!(latests[0].send_time, 1000);
}

#[test]
fn test_groups_are_keyed_by_security_id() {
    let batch = vec![
        quote("A", 10, 1, 0),
        quote("B", 20, 1, 0),
        quote("A", 30, 1, 0),
    ];
    let (_, latests) = aggregate_batch(&batch).expect("aggregate");

    assert_eq!(latests.len(), 2);
    // Sorted for deterministic SQL.
    assert_eq!(latests[0].security_id, "A");
    assert_eq!(latests[0].send_time, 30);
    assert_eq!(latests[1].security_id, "B");
    assert_eq!(latests[1].send_time, 20);
}

#[test]
fn test_empty_batch_is_empty() {
    let (details, latests) = aggregate_batch(&[]).expect("aggregate");
    assert!(details.is_empty());
    assert!(latests.is_empty());
}
