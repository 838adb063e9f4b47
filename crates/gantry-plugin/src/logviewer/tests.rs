//! Tests for log-viewer forwarding.

use std::sync::Arc;
use std::thread;

use super::*;
use crate::wire::PipeTransport;

fn connected_pair() -> (Arc<Connection>, Arc<Connection>) {
    let (a, b) = PipeTransport::pair();
    let host = Connection::new(Arc::new(a));
    let plugin = Connection::new(Arc::new(b));

    let far = Arc::clone(&plugin);
    let handle = thread::spawn(move || far.handshake());
    host.handshake().expect("host handshake");
    handle.join().expect("thread").expect("plugin handshake");

    host.start();
    plugin.start();
    (host, plugin)
}

fn event(partition: &str, message: &str) -> LogEvent {
    LogEvent {
        partition: partition.into(),
        timestamp_millis: 1_700_000_000_000,
        message: message.into(),
    }
}

#[test]
fn batches_arrive_in_order_then_none_on_close() {
    let (host, plugin) = connected_pair();

    let stream_id = host.broker().next_id();
    let viewer = LogViewerClient::new(host.open_stream(stream_id));

    let writer = LogBatchWriter::new(Arc::clone(&plugin), stream_id);
    writer.send(&LogBatch {
        events: vec![event("pod-1", "starting"), event("pod-1", "listening")],
    });
    writer.send(&LogBatch {
        events: vec![event("pod-2", "starting")],
    });
    writer.close();

    let first = viewer.next_batch().expect("first").expect("batch");
    assert_eq!(first.events.len(), 2);
    assert_eq!(first.events[0].message, "starting");
    assert_eq!(first.events[1].partition, "pod-1");

    let second = viewer.next_batch().expect("second").expect("batch");
    assert_eq!(second.events[0].partition, "pod-2");

    assert!(viewer.next_batch().expect("closed").is_none());
}

#[test]
fn viewer_sees_none_when_connection_drops() {
    let (host, plugin) = connected_pair();
    let stream_id = host.broker().next_id();
    let viewer = LogViewerClient::new(host.open_stream(stream_id));

    drop(plugin);
    host.close();
    assert!(viewer.next_batch().expect("closed").is_none());
}

#[test]
fn log_batch_serde_round_trips() {
    let batch = LogBatch {
        events: vec![event("pod-1", "hello")],
    };
    let json = serde_json::to_string(&batch).expect("serialize");
    let back: LogBatch = serde_json::from_str(&json).expect("parse");
    assert_eq!(back, batch);
}
