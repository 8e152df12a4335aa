//! End-to-end pipeline tests over a loopback tracker.
//!
//! Each test binds a real `TcpListener`, points the service at it, and
//! plays tracker traffic through the full transport → assembler →
//! decoder → mapper → applier path into a `BoneTable`.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use handwire::{BoneId, BoneTable, Config, ConnectionState, IngestService};

const DT: f32 = 1.0 / 60.0;

/// A two-hand tracker message; wrists at the calibration center.
const MESSAGE: &str = concat!(
    r#"{"hands":["#,
    r#"{"type":"Right","landmarks":["#,
    r#"{"id":0,"x":300,"y":290,"z":0.0},"#,
    r#"{"id":5,"x":340,"y":250,"z":-0.02},"#,
    r#"{"id":8,"x":360,"y":230,"z":-0.03}]},"#,
    r#"{"type":"Left","landmarks":["#,
    r#"{"id":0,"x":260,"y":290,"z":0.0},"#,
    r#"{"id":9,"x":240,"y":250,"z":-0.01}]}"#,
    r#"]}"#
);

fn bind_tracker() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn test_config(port: u16) -> Config {
    Config {
        address: "127.0.0.1".into(),
        port,
        ..Config::default()
    }
}

/// Tick the service until `done` returns true or the deadline passes.
fn tick_until(
    service: &mut IngestService,
    table: &mut BoneTable,
    what: &str,
    mut done: impl FnMut(&IngestService, &BoneTable) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        service.tick(DT, table);
        if done(service, table) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = listener.accept().expect("accept tracker client");
    stream
}

#[test]
fn whole_message_reaches_the_bone_table() {
    let (listener, port) = bind_tracker();
    let mut service = IngestService::new(&test_config(port));
    let mut table = BoneTable::new();

    // First tick connects.
    service.tick(DT, &mut table);
    let mut tracker = accept(&listener);
    assert_eq!(service.state(), ConnectionState::Connected);

    tracker.write_all(MESSAGE.as_bytes()).unwrap();
    tracker.flush().unwrap();

    tick_until(&mut service, &mut table, "first message", |s, _| {
        s.stats().messages >= 1
    });

    // Right wrist sat at the calibration center: target origin.
    let wrist = table.get(BoneId("wrist_inner_r")).expect("right wrist updated");
    assert!(wrist.position.norm() < 1e-5, "{:?}", wrist.position);

    // Mapped joints exist for both hands; fingertip id 8 has no bone.
    assert!(table.get(BoneId("index_01_r")).is_some());
    assert!(table.get(BoneId("middle_01_l")).is_some());
    assert_eq!(table.len(), 4);

    let stats = service.stats();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.decode_errors, 0);
    assert_eq!(stats.bone_updates, 4);
}

#[test]
fn message_split_across_writes_decodes_once() {
    let (listener, port) = bind_tracker();
    let mut service = IngestService::new(&test_config(port));
    let mut table = BoneTable::new();

    service.tick(DT, &mut table);
    let mut tracker = accept(&listener);

    // Split mid-message at an awkward boundary (inside a number).
    let bytes = MESSAGE.as_bytes();
    let split = MESSAGE.find("340").unwrap() + 1;
    tracker.write_all(&bytes[..split]).unwrap();
    tracker.flush().unwrap();

    // Give the partial time to arrive; it must not decode yet.
    let settle = Instant::now() + Duration::from_millis(100);
    while Instant::now() < settle {
        service.tick(DT, &mut table);
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(service.stats().messages, 0);

    tracker.write_all(&bytes[split..]).unwrap();
    tracker.flush().unwrap();

    tick_until(&mut service, &mut table, "reassembled message", |s, _| {
        s.stats().messages >= 1
    });
    assert_eq!(service.stats().messages, 1);
    assert_eq!(service.stats().frame_errors, 0);
}

#[test]
fn malformed_frame_is_contained_to_itself() {
    let (listener, port) = bind_tracker();
    let mut service = IngestService::new(&test_config(port));
    let mut table = BoneTable::new();

    service.tick(DT, &mut table);
    let mut tracker = accept(&listener);

    // A brace-balanced but unparsable frame, then a valid message.
    tracker.write_all(b"{not json}").unwrap();
    tracker.write_all(MESSAGE.as_bytes()).unwrap();
    tracker.flush().unwrap();

    tick_until(&mut service, &mut table, "recovery after bad frame", |s, _| {
        s.stats().messages >= 1
    });

    let stats = service.stats();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.messages, 1);
    assert_eq!(service.state(), ConnectionState::Connected);
}

#[test]
fn service_reconnects_after_tracker_restart() {
    let (listener, port) = bind_tracker();
    let mut service = IngestService::new(&test_config(port));
    let mut table = BoneTable::new();

    service.tick(DT, &mut table);
    let mut tracker = accept(&listener);

    tracker.write_all(MESSAGE.as_bytes()).unwrap();
    tracker.flush().unwrap();
    tick_until(&mut service, &mut table, "message before restart", |s, _| {
        s.stats().messages >= 1
    });

    // Tracker dies.
    drop(tracker);
    tick_until(&mut service, &mut table, "disconnect observed", |s, _| {
        s.state() != ConnectionState::Connected
    });

    // Backoff gates the retry; large dt ticks fast-forward the timer.
    let deadline = Instant::now() + Duration::from_secs(5);
    while service.state() != ConnectionState::Connected {
        service.tick(1.0, &mut table);
        assert!(Instant::now() < deadline, "never reconnected");
        std::thread::sleep(Duration::from_millis(2));
    }
    let mut tracker = accept(&listener);
    assert_eq!(service.stats().reconnects, 1);

    // The new session still decodes.
    tracker.write_all(MESSAGE.as_bytes()).unwrap();
    tracker.flush().unwrap();
    tick_until(&mut service, &mut table, "message after reconnect", |s, _| {
        s.stats().messages >= 2
    });
}

#[test]
fn burst_of_messages_in_one_chunk_all_apply() {
    let (listener, port) = bind_tracker();
    let mut service = IngestService::new(&test_config(port));
    let mut table = BoneTable::new();

    service.tick(DT, &mut table);
    let mut tracker = accept(&listener);

    // The tracker pushes faster than the host ticks: three messages queue
    // up and arrive in one receive.
    let burst = MESSAGE.repeat(3);
    tracker.write_all(burst.as_bytes()).unwrap();
    tracker.flush().unwrap();

    tick_until(&mut service, &mut table, "burst drained", |s, _| {
        s.stats().messages >= 3
    });
    assert_eq!(service.stats().messages, 3);
}

#[test]
fn close_mid_session_is_clean_and_idempotent() {
    let (listener, port) = bind_tracker();
    let mut service = IngestService::new(&test_config(port));
    let mut table = BoneTable::new();

    service.tick(DT, &mut table);
    let _tracker = accept(&listener);

    service.close();
    service.close();
    assert_eq!(service.state(), ConnectionState::Disconnected);

    // Ticking a closed service does nothing.
    service.tick(DT, &mut table);
    assert_eq!(service.stats().messages, 0);
}
