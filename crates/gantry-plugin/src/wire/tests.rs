//! Unit tests for the frame protocol and connection multiplexing.

use std::io::BufReader;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use super::*;

struct EchoService;

impl Service for EchoService {
    fn handle(
        &self,
        method: &str,
        body: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, PluginError> {
        match method {
            "echo" => Ok(body),
            "slow" => loop {
                if ctx.cancel.is_cancelled() {
                    return Err(PluginError::Cancelled);
                }
                thread::sleep(Duration::from_millis(5));
            },
            other => Err(PluginError::Unimplemented {
                message: format!("no method '{other}'"),
            }),
        }
    }
}

fn connected_pair() -> (Arc<Connection>, Arc<Connection>) {
    let (a, b) = PipeTransport::pair();
    let conn_a = Connection::new(Arc::new(a));
    let conn_b = Connection::new(Arc::new(b));

    let far = Arc::clone(&conn_b);
    let handle = thread::spawn(move || far.handshake());
    conn_a.handshake().expect("near handshake");
    handle
        .join()
        .expect("handshake thread")
        .expect("far handshake");

    conn_a.start();
    conn_b.start();
    (conn_a, conn_b)
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[test]
fn frames_round_trip_through_serde() {
    let frames = vec![
        Frame::Hello(gantry_proto::Handshake::current()),
        Frame::Request {
            id: 1,
            service: "builder".into(),
            method: "build".into(),
            body: json!({"x": 1}),
        },
        Frame::Response {
            id: 1,
            body: json!({"ok": true}),
        },
        Frame::Error {
            id: 2,
            error: WireError {
                code: ErrorCode::Unimplemented,
                message: "nope".into(),
            },
        },
        Frame::Cancel { id: 3 },
        Frame::StreamData {
            stream_id: 9,
            body: json!("line"),
        },
        Frame::StreamClose { stream_id: 9 },
    ];

    for frame in frames {
        let line = serde_json::to_string(&frame).expect("serialize");
        let back: Frame = serde_json::from_str(&line).expect("parse");
        assert_eq!(back, frame);
    }
}

#[test]
fn jsonl_transport_round_trips_frames() {
    let frame = Frame::Request {
        id: 7,
        service: "platform".into(),
        method: "deploy".into(),
        body: json!({"replicas": 3}),
    };
    let line = serde_json::to_string(&frame).expect("serialize");
    let input = format!("{line}\n");

    let transport = JsonlTransport::new(BufReader::new(input.as_bytes()), Vec::<u8>::new());
    let received = transport.recv().expect("recv").expect("frame");
    assert_eq!(received, frame);

    transport.send(&frame).expect("send");
    assert_eq!(transport.recv().expect("recv at eof"), None);
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[test]
fn call_round_trips_through_a_service() {
    let (client, server) = connected_pair();
    server.register_service("echo", Arc::new(EchoService));

    let body = client
        .call("echo", "echo", json!({"n": 42}), &CancelToken::new())
        .expect("call");
    assert_eq!(body, json!({"n": 42}));
}

#[test]
fn unknown_service_is_unimplemented() {
    let (client, _server) = connected_pair();
    let err = client
        .call("ghost", "anything", json!({}), &CancelToken::new())
        .expect_err("unknown service");
    assert!(err.is_unimplemented());
}

#[test]
fn unknown_method_is_unimplemented() {
    let (client, server) = connected_pair();
    server.register_service("echo", Arc::new(EchoService));

    let err = client
        .call("echo", "ghost", json!({}), &CancelToken::new())
        .expect_err("unknown method");
    assert!(err.is_unimplemented());
}

#[test]
fn concurrent_calls_multiplex_over_one_connection() {
    let (client, server) = connected_pair();
    server.register_service("echo", Arc::new(EchoService));

    let mut handles = Vec::new();
    for n in 0..8 {
        let client = Arc::clone(&client);
        handles.push(thread::spawn(move || {
            client
                .call("echo", "echo", json!({ "n": n }), &CancelToken::new())
                .expect("call")
        }));
    }
    for (n, handle) in handles.into_iter().enumerate() {
        let body = handle.join().expect("thread");
        assert_eq!(body, json!({ "n": n }));
    }
}

#[test]
fn cancellation_aborts_an_in_flight_call() {
    let (client, server) = connected_pair();
    server.register_service("echo", Arc::new(EchoService));

    let token = CancelToken::new();
    let canceller = token.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        canceller.cancel();
    });

    let err = client
        .call("echo", "slow", json!({}), &token)
        .expect_err("cancelled");
    assert!(matches!(err, PluginError::Cancelled));
}

// ---------------------------------------------------------------------------
// Sub-streams
// ---------------------------------------------------------------------------

#[test]
fn stream_frames_route_to_the_registered_receiver() {
    let (near, far) = connected_pair();
    let stream_id = near.broker().next_id();
    let events = near.open_stream(stream_id);

    far.send_stream(stream_id, &json!("first")).expect("send");
    far.send_stream(stream_id, &json!("second")).expect("send");
    far.close_stream(stream_id);

    assert_eq!(
        events.recv().expect("first"),
        StreamEvent::Data(json!("first"))
    );
    assert_eq!(
        events.recv().expect("second"),
        StreamEvent::Data(json!("second"))
    );
    assert_eq!(events.recv().expect("closed"), StreamEvent::Closed);
}

#[test]
fn frames_for_unknown_streams_are_dropped() {
    let (_near, far) = connected_pair();
    // No receiver registered: must not wedge or kill the connection.
    far.send_stream(999, &json!("orphan")).expect("send");
}

#[test]
fn closing_the_connection_fails_outstanding_calls() {
    let (client, server) = connected_pair();
    server.register_service("echo", Arc::new(EchoService));

    let caller = Arc::clone(&client);
    let handle = thread::spawn(move || {
        caller.call("echo", "slow", json!({}), &CancelToken::new())
    });

    thread::sleep(Duration::from_millis(30));
    client.close();

    let result = handle.join().expect("thread");
    assert!(result.is_err());
}
