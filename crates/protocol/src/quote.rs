//! Quote message model - the two-layer JSON wire format
//!
//! The upstream gateway pushes envelopes shaped like:
//!
//! ```json
//! {
//!   "data": {
//!     "data": "{\"askPrices\":[...],\"bidPrices\":[...],\"securityId\":\"HK...\"}",
//!     "messageId": "D1KNER1XUNB003EKWSKG",
//!     "messageType": "BOND_ORDER_BOOK_MSG",
//!     "organization": "AF",
//!     "receiverId": "HK0000108958",
//!     "timestamp": 1751607140490
//!   },
//!   "sendTime": 1751607140494,
//!   "wsMessageType": "ATS_QUOTE"
//! }
//! ```
//!
//! The inner `data` field is a JSON string, not an object - it gets a second
//! decode pass. [`parse_quote`] performs both passes and validates the
//! security identifier.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::Result;

/// Outer message envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteEnvelope {
    /// Routing metadata plus the embedded payload string
    pub data: QuoteBody,

    /// Gateway send time, milliseconds since epoch
    pub send_time: i64,

    /// Message class, e.g. `ATS_QUOTE`
    pub ws_message_type: String,
}

/// Envelope body: metadata around the embedded payload string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteBody {
    /// Inner JSON string holding the bid/ask arrays
    #[serde(rename = "data")]
    pub price_data: String,

    /// Upstream message identifier
    pub message_id: String,

    /// Upstream message type, e.g. `BOND_ORDER_BOOK_MSG`
    pub message_type: String,

    /// Originating organization code
    pub organization: String,

    /// Receiver identifier (mirrors the security id upstream)
    pub receiver_id: String,

    /// Business timestamp, milliseconds since epoch
    pub timestamp: i64,
}

/// Decoded inner payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricePayload {
    /// Seller-intent entries
    pub ask_prices: Vec<PriceEntry>,

    /// Buyer-intent entries
    pub bid_prices: Vec<PriceEntry>,

    /// Instrument identifier (ISIN); must be non-empty
    pub security_id: String,
}

/// One bid or ask entry inside the payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceEntry {
    /// Quoting broker identifier
    pub broker_id: String,

    /// `Y`/`N` - price is to-be-determined
    pub is_tbd: String,

    /// `Y`/`N` - entry is valid
    pub is_valid: String,

    /// Minimum transactable quantity
    pub min_trans_quantity: f64,

    /// Quoted quantity
    pub order_qty: f64,

    /// Clean price
    pub price: f64,

    /// Quote order number
    pub quote_order_no: String,

    /// Quote time, milliseconds since epoch
    pub quote_time: i64,

    /// Instrument identifier (repeated per entry upstream)
    pub security_id: String,

    /// Settlement convention, e.g. `T2`
    pub settle_type: String,

    /// `BID` or `ASK`
    pub side: String,

    /// Yield, percent
    #[serde(rename = "yield")]
    pub yield_rate: f64,
}

/// A fully decoded quote: envelope metadata plus the inner payload.
///
/// Owned by whichever pipeline stage currently holds it; ownership transfers
/// on every channel send.
#[derive(Debug, Clone)]
pub struct ParsedQuote {
    /// Decoded outer envelope
    pub envelope: QuoteEnvelope,

    /// Decoded inner payload
    pub payload: PricePayload,
}

impl ParsedQuote {
    /// Total number of price entries (asks plus bids)
    pub fn entry_count(&self) -> usize {
        self.payload.ask_prices.len() + self.payload.bid_prices.len()
    }

    /// The envelope serialized back to JSON, as persisted in the
    /// latest-quote table.
    pub fn raw_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.envelope)
    }
}

/// Decode a raw subscription frame body into a [`ParsedQuote`].
///
/// Performs both JSON passes (envelope, then the embedded payload string)
/// and rejects envelopes whose `securityId` is empty. Callers route any
/// error to the dead-letter channel.
pub fn parse_quote(raw: &[u8]) -> Result<ParsedQuote> {
    let envelope: QuoteEnvelope =
        serde_json::from_slice(raw).map_err(ProtocolError::Envelope)?;

    let payload: PricePayload =
        serde_json::from_str(&envelope.data.price_data).map_err(ProtocolError::Payload)?;

    if payload.security_id.is_empty() {
        return Err(ProtocolError::EmptySecurityId);
    }

    Ok(ParsedQuote { envelope, payload })
}
