//! Tests for the two-layer quote message decode

use crate::{parse_quote, ProtocolError};

/// A captured production envelope: one ask, one bid on HK0000108958.
const ORDER_BOOK_FRAME: &str = r#"{"data":{"data":"{\"askPrices\":[{\"brokerId\":\"1941007146139877377\",\"isTbd\":\"N\",\"isValid\":\"Y\",\"minTransQuantity\":1000000,\"orderQty\":14000000,\"price\":91.356894,\"quoteOrderNo\":\"D1KNER1XUNB003EKWSKG\",\"quoteTime\":1751607138931,\"securityId\":\"HK0000108958\",\"settleType\":\"T2\",\"side\":\"ASK\",\"yield\":9.112088}],\"bidPrices\":[{\"brokerId\":\"1941007146139877376\",\"isTbd\":\"N\",\"isValid\":\"Y\",\"minTransQuantity\":1000000,\"orderQty\":14000000,\"price\":90.356894,\"quoteOrderNo\":\"D1KNER1XUNB003EKWSKG\",\"quoteTime\":1751607138790,\"securityId\":\"HK0000108958\",\"settleType\":\"T2\",\"side\":\"BID\",\"yield\":9.764276}],\"securityId\":\"HK0000108958\"}","messageId":"D1KNER1XUNB003EKWSKG","messageType":"BOND_ORDER_BOOK_MSG","organization":"AF","receiverId":"HK0000108958","timestamp":1751607140490},"sendTime":1751607140494,"wsMessageType":"ATS_QUOTE"}"#;

/// Bid-only frame with empty asks.
const BID_ONLY_FRAME: &str = r#"{"data":{"data":"{\"askPrices\":[],\"bidPrices\":[{\"brokerId\":\"1941007160979324928\",\"isTbd\":\"N\",\"isValid\":\"Y\",\"minTransQuantity\":6000000,\"orderQty\":13000000,\"price\":99.519735,\"quoteOrderNo\":\"D1KNES1XUNB003EKWSX0\",\"quoteTime\":1751607142490,\"securityId\":\"HK0000098928\",\"settleType\":\"T2\",\"side\":\"BID\",\"yield\":4.517865}],\"securityId\":\"HK0000098928\"}","messageId":"D1KNES1XUNB003EKWSX0","messageType":"BOND_ORDER_BOOK_MSG","organization":"AF","receiverId":"HK0000098928","timestamp":1751607144048},"sendTime":1751607144053,"wsMessageType":"ATS_QUOTE"}"#;

#[test]
fn test_parse_order_book_frame() {
    let parsed = parse_quote(ORDER_BOOK_FRAME.as_bytes()).expect("parse");

    assert_eq!(parsed.payload.security_id, "HK0000108958");
    assert_eq!(parsed.envelope.send_time, 1751607140494);
    assert_eq!(parsed.envelope.ws_message_type, "ATS_QUOTE");
    assert_eq!(parsed.envelope.data.message_id, "D1KNER1XUNB003EKWSKG");
    assert_eq!(parsed.envelope.data.message_type, "BOND_ORDER_BOOK_MSG");
    assert_eq!(parsed.envelope.data.timestamp, 1751607140490);
    assert_eq!(parsed.entry_count(), 2);

    let ask = &parsed.payload.ask_prices[0];
    assert_eq!(ask.side, "ASK");
    assert_eq!(ask.broker_id, "1941007146139877377");
    assert!((ask.price - 91.356894).abs() < 1e-9);
    assert!((ask.yield_rate - 9.112088).abs() < 1e-9);
    assert_eq!(ask.quote_time, 1751607138931);
    assert_eq!(ask.settle_type, "T2");
    assert_eq!(ask.is_valid, "Y");
    assert_eq!(ask.is_tbd, "N");

    let bid = &parsed.payload.bid_prices[0];
    assert_eq!(bid.side, "BID");
    assert!((bid.price - 90.356894).abs() < 1e-9);
}

#[test]
fn test_parse_bid_only_frame() {
    let parsed = parse_quote(BID_ONLY_FRAME.as_bytes()).expect("parse");

    assert_eq!(parsed.payload.security_id, "HK0000098928");
    assert!(parsed.payload.ask_prices.is_empty());
    assert_eq!(parsed.payload.bid_prices.len(), 1);
    assert_eq!(parsed.entry_count(), 1);
}

#[test]
fn test_parse_rejects_truncated_envelope() {
    let err = parse_quote(br#"{"invalid":"json"#).unwrap_err();
    assert!(matches!(err, ProtocolError::Envelope(_)));
    assert!(err.is_dead_letter());
}

#[test]
fn test_parse_rejects_malformed_inner_payload() {
    let raw = r#"{"data":{"data":"not json at all","messageId":"M1"},"sendTime":1}"#;
    let err = parse_quote(raw.as_bytes()).unwrap_err();
    assert!(matches!(err, ProtocolError::Payload(_)));
    assert!(err.is_dead_letter());
}

#[test]
fn test_parse_rejects_empty_security_id() {
    let raw = r#"{"data":{"data":"{\"askPrices\":[],\"bidPrices\":[],\"securityId\":\"\"}","messageId":"M1"},"sendTime":1}"#;
    let err = parse_quote(raw.as_bytes()).unwrap_err();
    assert!(matches!(err, ProtocolError::EmptySecurityId));
}

#[test]
fn test_parse_accepts_empty_price_arrays() {
    let raw = r#"{"data":{"data":"{\"askPrices\":[],\"bidPrices\":[],\"securityId\":\"X\"}","messageId":"M1"},"sendTime":1000}"#;
    let parsed = parse_quote(raw.as_bytes()).expect("parse");
    assert_eq!(parsed.payload.security_id, "X");
    assert_eq!(parsed.entry_count(), 0);
}

#[test]
fn test_raw_json_round_trips_envelope() {
    let parsed = parse_quote(ORDER_BOOK_FRAME.as_bytes()).expect("parse");
    let raw = parsed.raw_json().expect("serialize");

    // The serialized envelope must decode back to an identical quote.
    let reparsed = parse_quote(raw.as_bytes()).expect("reparse");
    assert_eq!(reparsed.envelope.send_time, parsed.envelope.send_time);
    assert_eq!(
        reparsed.envelope.data.message_id,
        parsed.envelope.data.message_id
    );
    assert_eq!(reparsed.payload.security_id, parsed.payload.security_id);
    assert_eq!(reparsed.entry_count(), parsed.entry_count());
}
