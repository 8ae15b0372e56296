//! Tests for the STOMP frame codec

use std::time::Duration;

use crate::stomp::command;
use crate::{negotiate_heart_beat, Frame, ProtocolError};

#[test]
fn test_encode_connect_frame() {
    let frame = Frame::new(command::CONNECT)
        .header("accept-version", "1.0,1.1,1.2")
        .header("host", "localhost")
        .header("heart-beat", "30000,120000")
        .header("token", "abc123");

    let wire = frame.encode();
    let text = std::str::from_utf8(&wire[..wire.len() - 1]).unwrap();

    assert!(text.starts_with("CONNECT\n"));
    assert!(text.contains("accept-version:1.0,1.1,1.2\n"));
    assert!(text.contains("heart-beat:30000,120000\n"));
    assert!(text.ends_with("\n\n"));
    assert_eq!(*wire.last().unwrap(), 0, "frame must be NUL terminated");
}

#[test]
fn test_encode_appends_content_length_for_bodies() {
    let frame = Frame::new("SEND").header("destination", "/queue/x").body("hello");
    let wire = frame.encode();
    let text = String::from_utf8_lossy(&wire);
    assert!(text.contains("content-length:5\n"));
    assert!(text.contains("\n\nhello"));
}

#[test]
fn test_decode_connected_frame() {
    let wire = b"CONNECTED\nversion:1.2\nheart-beat:10000,10000\n\n\0";
    let frame = Frame::decode(wire).unwrap().expect("frame");

    assert_eq!(frame.command, "CONNECTED");
    assert_eq!(frame.get("version"), Some("1.2"));
    assert_eq!(frame.get("heart-beat"), Some("10000,10000"));
    assert!(frame.body.is_empty());
}

#[test]
fn test_decode_message_frame_with_body() {
    let wire = b"MESSAGE\ndestination:/user/queue/v1/apiatsbondquote/messages\nmessage-id:7\nsubscription:s1\n\n{\"sendTime\":1}\0";
    let frame = Frame::decode(wire).unwrap().expect("frame");

    assert_eq!(frame.command, "MESSAGE");
    assert_eq!(
        frame.get("destination"),
        Some("/user/queue/v1/apiatsbondquote/messages")
    );
    assert_eq!(frame.body, b"{\"sendTime\":1}");
}

#[test]
fn test_decode_crlf_line_endings() {
    let wire = b"MESSAGE\r\ndestination:/q\r\n\r\nbody\0";
    let frame = Frame::decode(wire).unwrap().expect("frame");
    assert_eq!(frame.command, "MESSAGE");
    assert_eq!(frame.get("destination"), Some("/q"));
    assert_eq!(frame.body, b"body");
}

#[test]
fn test_decode_heart_beat_is_none() {
    assert!(Frame::decode(b"").unwrap().is_none());
    assert!(Frame::decode(b"\n").unwrap().is_none());
    assert!(Frame::decode(b"\r\n").unwrap().is_none());
}

#[test]
fn test_decode_rejects_missing_header_terminator() {
    let err = Frame::decode(b"MESSAGE\ndestination:/q\nno-blank-line").unwrap_err();
    assert!(matches!(err, ProtocolError::Frame(_)));
}

#[test]
fn test_header_escaping_round_trip() {
    let frame = Frame::new("SEND").header("weird", "a:b\nc\\d");
    let wire = frame.encode();

    let text = String::from_utf8_lossy(&wire);
    assert!(text.contains("weird:a\\cb\\nc\\\\d\n"));

    let decoded = Frame::decode(&wire).unwrap().expect("frame");
    assert_eq!(decoded.get("weird"), Some("a:b\nc\\d"));
}

#[test]
fn test_connect_headers_are_not_escaped() {
    // CONNECT/CONNECTED are exempt from escaping for 1.0 compatibility.
    let frame = Frame::new(command::CONNECT).header("login", "a\\b");
    let wire = frame.encode();
    assert!(String::from_utf8_lossy(&wire).contains("login:a\\b\n"));
}

#[test]
fn test_negotiate_heart_beat() {
    // Client offers (30000, 120000), server answers "10000,20000":
    // send every max(30000, 20000), expect activity within max(120000, 10000).
    let hb = negotiate_heart_beat((30_000, 120_000), "10000,20000").unwrap();
    assert_eq!(hb.send_interval, Duration::from_millis(30_000));
    assert_eq!(hb.recv_timeout, Duration::from_millis(120_000));
}

#[test]
fn test_negotiate_heart_beat_zero_disables() {
    let hb = negotiate_heart_beat((30_000, 120_000), "0,0").unwrap();
    assert_eq!(hb.send_interval, Duration::ZERO);
    assert_eq!(hb.recv_timeout, Duration::ZERO);
}

#[test]
fn test_negotiate_heart_beat_rejects_garbage() {
    assert!(matches!(
        negotiate_heart_beat((1, 1), "not-a-pair").unwrap_err(),
        ProtocolError::HeartBeat(_)
    ));
    assert!(matches!(
        negotiate_heart_beat((1, 1), "x,y").unwrap_err(),
        ProtocolError::HeartBeat(_)
    ));
}
