//! Dead-letter drain
//!
//! Frames that failed to parse are kept for diagnostics, not retried. The
//! drain logs each one with a bounded preview and keeps a running count; it
//! exits when the dead channel closes and returns the total.

use crossfire::AsyncRx;
use tokio::task::JoinHandle;

/// Longest payload preview written to the log
const PREVIEW_LIMIT: usize = 256;

/// Spawn the drain task; resolves to the total dead-letter count when the
/// channel closes.
pub fn spawn_dead_letter_drain(dead_rx: AsyncRx<Vec<u8>>) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut total = 0u64;
        while let Ok(raw) = dead_rx.recv().await {
            total += 1;
            tracing::warn!(
                bytes = raw.len(),
                total,
                payload = %preview(&raw),
                "dead-lettered frame"
            );
        }
        tracing::info!(total, "dead-letter drain finished");
        total
    })
}

fn preview(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut preview: String = text.chars().take(PREVIEW_LIMIT).collect();
    if text.chars().count() > PREVIEW_LIMIT {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        let p = preview(long.as_bytes());
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 256 + 3);
    }

    #[test]
    fn test_preview_keeps_short_payloads() {
        assert_eq!(preview(b"{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_preview_handles_invalid_utf8() {
        let p = preview(&[0xff, 0xfe, b'o', b'k']);
        assert!(p.contains("ok"));
    }
}
