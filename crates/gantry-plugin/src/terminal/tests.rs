//! Tests for terminal UI forwarding.

use std::sync::{Arc, Mutex};
use std::thread;

use super::*;
use crate::wire::PipeTransport;

#[derive(Default)]
struct RecordingUi {
    events: Mutex<Vec<String>>,
}

impl TerminalUi for RecordingUi {
    fn output(&self, line: &str) {
        self.events
            .lock()
            .expect("lock")
            .push(format!("line:{line}"));
    }

    fn step(&self, message: &str) {
        self.events
            .lock()
            .expect("lock")
            .push(format!("step:{message}"));
    }

    fn named_values(&self, values: &[(String, String)]) {
        let rendered: Vec<String> = values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        self.events
            .lock()
            .expect("lock")
            .push(format!("values:{}", rendered.join(",")));
    }
}

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

#[test]
fn events_forward_in_order_until_close() {
    let (host, plugin) = connected_pair();

    let stream_id = host.broker().next_id();
    let events = host.open_stream(stream_id);

    let remote = RemoteTerminal::new(Arc::clone(&plugin), stream_id);
    remote.output("deploying");
    remote.step("pushing image");
    remote.named_values(&[("url".into(), "https://app".into())]);
    plugin.close_stream(stream_id);

    let ui = RecordingUi::default();
    serve_terminal(&events, &ui).expect("serve");

    assert_eq!(
        *ui.events.lock().expect("lock"),
        vec![
            "line:deploying".to_owned(),
            "step:pushing image".to_owned(),
            "values:url=https://app".to_owned(),
        ]
    );
}

#[test]
fn serve_returns_cleanly_when_connection_drops() {
    let (host, plugin) = connected_pair();
    let stream_id = host.broker().next_id();
    let events = host.open_stream(stream_id);

    drop(plugin);
    host.close();

    let ui = RecordingUi::default();
    serve_terminal(&events, &ui).expect("serve exits");
    assert!(ui.events.lock().expect("lock").is_empty());
}

mockall::mock! {
    ScriptedUi {}

    impl TerminalUi for ScriptedUi {
        fn output(&self, line: &str);
        fn step(&self, message: &str);
        fn named_values(&self, values: &[(String, String)]);
    }
}

#[test]
fn scripted_ui_sees_exactly_the_forwarded_calls() {
    let (host, plugin) = connected_pair();
    let stream_id = host.broker().next_id();
    let events = host.open_stream(stream_id);

    let remote = RemoteTerminal::new(Arc::clone(&plugin), stream_id);
    remote.output("one");
    remote.output("two");
    plugin.close_stream(stream_id);

    let mut ui = MockScriptedUi::new();
    let mut seq = mockall::Sequence::new();
    ui.expect_output()
        .withf(|line| line == "one")
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    ui.expect_output()
        .withf(|line| line == "two")
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    ui.expect_step().never();
    ui.expect_named_values().never();

    serve_terminal(&events, &ui).expect("serve");
}

#[test]
fn terminal_events_serde_round_trip() {
    let events = vec![
        TerminalEvent::Line {
            text: "hello".into(),
        },
        TerminalEvent::Step {
            message: "step 1".into(),
        },
        TerminalEvent::NamedValues {
            values: vec![("k".into(), "v".into())],
        },
    ];
    for event in events {
        let json = serde_json::to_string(&event).expect("serialize");
        let back: TerminalEvent = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, event);
    }
}
