//! Export error types

use thiserror::Error;

/// Errors that can occur during a snapshot cycle
#[derive(Debug, Error)]
pub enum ExportError {
    /// Reading the latest table failed
    #[error("snapshot query failed: {0}")]
    Storage(#[from] bondfeed_storage::StorageError),

    /// Spreadsheet generation failed
    #[error("spreadsheet error: {0}")]
    Sheet(#[from] rust_xlsxwriter::XlsxError),

    /// Local file staging failed
    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),

    /// Object-store upload failed
    #[error("upload failed: {0}")]
    Upload(String),

    /// Chat webhook send failed
    #[error("notify failed: {0}")]
    Notify(String),
}

impl ExportError {
    /// Create an upload error
    #[inline]
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a notify error
    #[inline]
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }
}
