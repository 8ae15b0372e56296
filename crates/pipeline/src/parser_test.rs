//! Parser stage tests: routing, drain-on-close, and backpressure

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::{channels, spawn_dead_letter_drain, ParserPool};

fn valid_frame(security_id: &str, send_time: i64) -> Vec<u8> {
    let inner = format!(
        r#"{{"askPrices":[],"bidPrices":[],"securityId":"{security_id}"}}"#
    );
    serde_json::json!({
        "data": {
            "data": inner,
            "messageId": format!("M-{send_time}"),
            "messageType": "BOND_ORDER_BOOK_MSG",
            "timestamp": send_time,
        },
        "sendTime": send_time,
        "wsMessageType": "ATS_QUOTE",
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_valid_frames_reach_parsed_channel() {
    let ch = channels(16, 16, 16);
    let pool = ParserPool::new();
    let workers = pool.spawn_workers(4, ch.raw_rx, ch.parsed_tx, ch.dead_tx);

    for i in 0..10 {
        ch.raw_tx.send(valid_frame("HK0000108958", i)).await.unwrap();
    }

    let mut got = 0;
    while got < 10 {
        let quote = timeout(Duration::from_secs(5), ch.parsed_rx.recv())
            .await
            .expect("parsed in time")
            .expect("channel open");
        assert_eq!(quote.payload.security_id, "HK0000108958");
        got += 1;
    }
    assert_eq!(pool.metrics_snapshot().frames_parsed, 10);

    drop(ch.raw_tx);
    for worker in workers {
        worker.await.unwrap();
    }
}

#[tokio::test]
async fn test_invalid_frames_are_dead_lettered() {
    let ch = channels(16, 16, 16);
    let pool = ParserPool::new();
    let _workers = pool.spawn_workers(2, ch.raw_rx, ch.parsed_tx, ch.dead_tx);

    let bad = br#"{"invalid":"json"#.to_vec();
    ch.raw_tx.send(bad.clone()).await.unwrap();

    // The dead channel gets the original bytes, untouched.
    let dead = timeout(Duration::from_secs(5), ch.dead_rx.recv())
        .await
        .expect("dead in time")
        .expect("channel open");
    assert_eq!(dead, bad);
    assert_eq!(pool.metrics_snapshot().frames_dead, 1);
    assert_eq!(pool.metrics_snapshot().frames_parsed, 0);
}

#[tokio::test]
async fn test_empty_security_id_is_dead_lettered() {
    let ch = channels(16, 16, 16);
    let pool = ParserPool::new();
    let _workers = pool.spawn_workers(1, ch.raw_rx, ch.parsed_tx, ch.dead_tx);

    ch.raw_tx.send(valid_frame("", 1)).await.unwrap();

    let dead = timeout(Duration::from_secs(5), ch.dead_rx.recv())
        .await
        .expect("dead in time")
        .expect("channel open");
    assert!(!dead.is_empty());
}

#[tokio::test]
async fn test_one_bad_frame_does_not_affect_others() {
    let ch = channels(16, 16, 16);
    let pool = ParserPool::new();
    let _workers = pool.spawn_workers(2, ch.raw_rx, ch.parsed_tx, ch.dead_tx);

    ch.raw_tx.send(valid_frame("A", 1)).await.unwrap();
    ch.raw_tx.send(b"not json".to_vec()).await.unwrap();
    ch.raw_tx.send(valid_frame("B", 2)).await.unwrap();

    let mut parsed_keys = Vec::new();
    for _ in 0..2 {
        let quote = timeout(Duration::from_secs(5), ch.parsed_rx.recv())
            .await
            .expect("parsed in time")
            .expect("channel open");
        parsed_keys.push(quote.payload.security_id);
    }
    parsed_keys.sort();
    assert_eq!(parsed_keys, vec!["A".to_string(), "B".to_string()]);

    assert!(timeout(Duration::from_secs(5), ch.dead_rx.recv())
        .await
        .expect("dead in time")
        .is_ok());
}

#[tokio::test]
async fn test_workers_drain_and_exit_on_close() {
    let ch = channels(64, 64, 16);
    let pool = ParserPool::new();
    let workers = pool.spawn_workers(4, ch.raw_rx, ch.parsed_tx.clone(), ch.dead_tx);

    for i in 0..50 {
        ch.raw_tx.send(valid_frame("K", i)).await.unwrap();
    }
    drop(ch.raw_tx);

    for worker in workers {
        timeout(Duration::from_secs(5), worker)
            .await
            .expect("workers exit after close")
            .unwrap();
    }

    // Everything queued before the close was drained.
    drop(ch.parsed_tx);
    let mut drained = 0;
    while ch.parsed_rx.recv().await.is_ok() {
        drained += 1;
    }
    assert_eq!(drained, 50);
}

#[tokio::test]
async fn test_raw_channel_backpressure_blocks_producer() {
    // Raw capacity 4, parsers halted: sends must stall after 4 frames and
    // resume without loss once the parsers start.
    let ch = channels(4, 16, 16);
    let sent = Arc::new(AtomicUsize::new(0));

    let producer = {
        let raw_tx = ch.raw_tx.clone();
        let sent = Arc::clone(&sent);
        tokio::spawn(async move {
            for i in 0..10 {
                raw_tx.send(valid_frame("HK0000108958", i)).await.unwrap();
                sent.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stalled_at = sent.load(Ordering::SeqCst);
    assert!(
        stalled_at <= 5,
        "producer should stall at channel capacity, sent {stalled_at}"
    );
    assert!(
        ch.raw_tx.try_send(valid_frame("X", 99)).is_err(),
        "channel must be full while parsers are halted"
    );

    // Start the parsers: the producer unblocks and nothing is dropped.
    let pool = ParserPool::new();
    let _workers = pool.spawn_workers(2, ch.raw_rx, ch.parsed_tx, ch.dead_tx);

    let mut got = 0;
    while got < 10 {
        let quote = timeout(Duration::from_secs(5), ch.parsed_rx.recv())
            .await
            .expect("parsed in time")
            .expect("channel open");
        if quote.payload.security_id == "HK0000108958" {
            got += 1;
        }
    }
    producer.await.unwrap();
    assert_eq!(sent.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_workers_survive_producer_turnover() {
    // A session restart hands a fresh sender clone to the new session; the
    // worker pools and channel capacities never change.
    let ch = channels(16, 32, 16);
    let pool = ParserPool::new();
    let _workers = pool.spawn_workers(2, ch.raw_rx, ch.parsed_tx, ch.dead_tx);

    let first_session = ch.raw_tx.clone();
    for i in 0..5 {
        first_session.send(valid_frame("A", i)).await.unwrap();
    }
    drop(first_session);

    let second_session = ch.raw_tx.clone();
    for i in 0..5 {
        second_session.send(valid_frame("B", i)).await.unwrap();
    }
    drop(second_session);

    let mut got = 0;
    while got < 10 {
        timeout(Duration::from_secs(5), ch.parsed_rx.recv())
            .await
            .expect("parsed in time")
            .expect("workers still running across producer turnover");
        got += 1;
    }
    assert_eq!(pool.metrics_snapshot().frames_parsed, 10);
}

#[tokio::test]
async fn test_dead_letter_drain_counts_and_exits() {
    let ch = channels(16, 16, 16);
    let drain = spawn_dead_letter_drain(ch.dead_rx);

    ch.dead_tx.send(b"bad one".to_vec()).await.unwrap();
    ch.dead_tx.send(b"bad two".to_vec()).await.unwrap();
    drop(ch.dead_tx);

    let total = timeout(Duration::from_secs(5), drain)
        .await
        .expect("drain exits")
        .unwrap();
    assert_eq!(total, 2);
}
