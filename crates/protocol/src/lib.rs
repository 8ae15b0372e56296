//! Bondfeed Protocol - Wire types for the quote ingestion pipeline
//!
//! This crate provides the types that flow through the pipeline:
//! - `QuoteEnvelope` / `PricePayload` - the two-layer JSON quote message
//! - `ParsedQuote` - the decoded pair that moves between pipeline stages
//! - `Frame` - the STOMP frame codec carried over the WebSocket tunnel
//!
//! # Wire format
//!
//! Quote messages arrive as nested JSON: an outer envelope with routing
//! metadata (`sendTime`, `wsMessageType`, `messageId`, ...) and an inner
//! `data` field that is itself a JSON *string* holding the bid/ask arrays.
//! Both layers must decode, and the inner `securityId` must be non-empty,
//! for a message to be accepted.

mod error;
mod quote;
mod stomp;

pub use error::ProtocolError;
pub use quote::{parse_quote, ParsedQuote, PriceEntry, PricePayload, QuoteBody, QuoteEnvelope};
pub use stomp::command as stomp_command;
pub use stomp::{negotiate_heart_beat, Frame, HeartBeat};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Quote side marker for seller-intent entries
pub const SIDE_ASK: &str = "ASK";

/// Quote side marker for buyer-intent entries
pub const SIDE_BID: &str = "BID";

// Test modules - only compiled during testing
#[cfg(test)]
mod quote_test;
#[cfg(test)]
mod stomp_test;
