//! Bondfeed Export - scheduled snapshots of the latest-quote table
//!
//! On a fixed interval the exporter reads every row of today's latest
//! table, rebuilds the bid/ask arrays from the stored envelope JSON, writes
//! a spreadsheet, uploads it to the object store, and posts the download
//! link to the operations channel. Every failure is logged and the next
//! tick tries again - a broken export never touches the ingest path.

mod error;
mod notify;
mod oss;
mod snapshot;

pub use error::ExportError;
pub use notify::Notifier;
pub use oss::{OssClient, UploadResult};
pub use snapshot::SnapshotExporter;

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Object-store category for exported spreadsheets
pub const UPLOAD_CATEGORY: &str = "Open";

#[cfg(test)]
mod notify_test;
#[cfg(test)]
mod snapshot_test;
