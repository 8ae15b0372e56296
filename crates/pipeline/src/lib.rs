//! Bondfeed Pipeline - the bounded multi-stage ingest core
//!
//! ```text
//! [Session]                [Parsers]                  [Writers]
//!   STOMP ──→ raw channel ──→ N workers ──→ parsed channel ──→ M workers ──→ MySQL
//!                │                │
//!                │                └──→ dead channel ──→ drain logger
//!                └── blocking sends propagate backpressure end to end
//! ```
//!
//! # Key design
//!
//! - **MPMC channels**: `crossfire` bounded channels let whole worker pools
//!   consume one queue concurrently
//! - **Backpressure**: every stage sends blocking; a slow writer stalls the
//!   parsers, which stall the session's raw sends
//! - **Drain on close**: dropping all senders closes a channel; each stage
//!   drains what is in flight and exits, so shutdown loses nothing that was
//!   already queued
//! - **Dead-lettering**: per-record decode failures are diagnostics, never
//!   session faults

mod dead_letter;
mod parser;

pub use dead_letter::spawn_dead_letter_drain;
pub use parser::{ParserMetricsSnapshot, ParserPool};

use crossfire::{AsyncRx, MAsyncRx, MAsyncTx};

use bondfeed_protocol::ParsedQuote;

/// The three bounded channels connecting the pipeline stages
pub struct PipelineChannels {
    /// Raw frame bodies, session -> parsers
    pub raw_tx: MAsyncTx<Vec<u8>>,
    /// Consumed by every parser worker
    pub raw_rx: MAsyncRx<Vec<u8>>,
    /// Parsed quotes, parsers -> writers
    pub parsed_tx: MAsyncTx<ParsedQuote>,
    /// Consumed by every writer worker
    pub parsed_rx: MAsyncRx<ParsedQuote>,
    /// Undecodable frame bodies, parsers -> drain
    pub dead_tx: MAsyncTx<Vec<u8>>,
    /// Consumed by the single drain task
    pub dead_rx: AsyncRx<Vec<u8>>,
}

/// Build the channel set with the configured capacities.
pub fn channels(raw_capacity: usize, parsed_capacity: usize, dead_capacity: usize) -> PipelineChannels {
    let (raw_tx, raw_rx) = crossfire::mpmc::bounded_async(raw_capacity.max(1));
    let (parsed_tx, parsed_rx) = crossfire::mpmc::bounded_async(parsed_capacity.max(1));
    let (dead_tx, dead_rx) = crossfire::mpsc::bounded_async(dead_capacity.max(1));
    PipelineChannels {
        raw_tx,
        raw_rx,
        parsed_tx,
        parsed_rx,
        dead_tx,
        dead_rx,
    }
}

#[cfg(test)]
mod parser_test;
