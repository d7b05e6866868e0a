//! End-to-end tests over loopback ports

use comterm_core::core::screen::Screen;
use comterm_core::{
    Controller, ControllerExit, ControllerOptions, EmulationTable, HistoryStore,
    LineBufferedInput, LoopbackBackend, PortSettings, ReceiverConfig, ReceiverEvent, ReceiverExit,
    SendMode, Session, TransportSession,
};
use crossbeam_channel::{unbounded, Receiver};
use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(20);

fn fast_receiver() -> ReceiverConfig {
    ReceiverConfig {
        poll_interval: POLL,
        idle_sleep: Duration::from_millis(5),
        join_timeout: Duration::from_secs(1),
    }
}

fn open_session(backend: &Arc<LoopbackBackend>, name: &str) -> Session {
    let transport = TransportSession::open(
        backend.clone(),
        name,
        PortSettings::default(),
        Duration::from_millis(20),
    )
    .unwrap();
    Session::new(transport, fast_receiver())
}

fn start(session: &mut Session) -> Receiver<ReceiverEvent> {
    let (tx, rx) = unbounded();
    session
        .start_receiver(Arc::new(EmulationTable::builtin()), Arc::new(tx))
        .unwrap();
    rx
}

#[test]
fn emulated_device_answers_handshake() {
    let backend = Arc::new(LoopbackBackend::new());
    let peer = backend.add_port("LOOP1");
    let mut session = open_session(&backend, "LOOP1");
    let events = start(&mut session);

    peer.write(&[0xAA, 0xBB, 0xCC]);
    assert_eq!(peer.wait_received(2, Duration::from_secs(2)), vec![0xDD, 0xEE]);

    match events.recv_timeout(Duration::from_secs(1)).unwrap() {
        ReceiverEvent::Received { port, data, .. } => {
            assert_eq!(port, "LOOP1");
            assert_eq!(data, vec![0xAA, 0xBB, 0xCC]);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ReceiverEvent::AutoResponse { .. }
    ));

    session.shutdown();
}

#[test]
fn paused_session_keeps_bytes_until_resumed() {
    let backend = Arc::new(LoopbackBackend::new());
    let peer = backend.add_port("LOOP1");
    let mut session = open_session(&backend, "LOOP1");
    let events = start(&mut session);

    session.pause_receiving();
    // let a cycle that was already past the gate finish
    std::thread::sleep(POLL * 3);

    peer.write(&[0x41]);
    std::thread::sleep(POLL * 5);
    assert_eq!(peer.pending_for_local(), 1);
    assert!(events.try_recv().is_err());

    session.resume_receiving(false).unwrap();
    assert_eq!(peer.wait_received(2, Duration::from_secs(2)), vec![0x20, 0x00]);
    assert_eq!(peer.pending_for_local(), 0);

    session.shutdown();
}

#[test]
fn shutdown_is_prompt_and_idempotent() {
    let backend = Arc::new(LoopbackBackend::new());
    let peer = backend.add_port("LOOP1");
    let mut session = open_session(&backend, "LOOP1");
    let _events = start(&mut session);
    session.pause_receiving();

    let started = Instant::now();
    let report = session.shutdown();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(report.port_closed);
    assert!(!report.receiver_timed_out);
    assert!(matches!(
        report.receiver_exit,
        Some(ReceiverExit::Stopped) | Some(ReceiverExit::PortClosed)
    ));
    assert!(session.is_receiving());
    assert!(!peer.is_in_use());

    let again = session.shutdown();
    assert!(!again.port_closed);
    assert!(again.receiver_exit.is_none());
}

#[test]
fn unplugged_device_stops_the_receiver() {
    let backend = Arc::new(LoopbackBackend::new());
    let _peer = backend.add_port("LOOP1");
    let mut session = open_session(&backend, "LOOP1");
    let events = start(&mut session);

    backend.unplug("LOOP1");

    let deadline = Instant::now() + Duration::from_secs(2);
    while session.receiver_alive() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!session.receiver_alive());
    assert!(matches!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ReceiverEvent::Fault { .. }
    ));

    let report = session.shutdown();
    assert!(matches!(report.receiver_exit, Some(ReceiverExit::Fault(_))));
}

#[test]
fn line_mode_controller_session_persists_history() {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("history.json");

    let backend = Arc::new(LoopbackBackend::new());
    let peer = backend.add_port("LOOP1");

    let script = "1\nhello\nesc\n2\nAA BB\n:q\n7\n";
    let input = LineBufferedInput::from_reader(
        Cursor::new(script.as_bytes().to_vec()),
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();

    let (screen, out) = Screen::capture();
    let options = ControllerOptions {
        preselected_port: Some("LOOP1".to_string()),
        use_defaults: true,
        receiver: fast_receiver(),
        key_poll: Duration::from_millis(10),
        ..ControllerOptions::default()
    };
    let mut controller = Controller::new(
        backend.clone(),
        Box::new(input),
        Arc::new(screen),
        HistoryStore::load(&history_path),
    )
    .with_options(options);

    assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
    assert_eq!(peer.take_received(), b"hello\xAA\xBB".to_vec());
    assert!(!peer.is_in_use());

    let out = out.contents();
    assert!(out.contains("TX text: hello"));
    assert!(out.contains("TX HEX: AA BB"));
    assert!(out.contains("Goodbye!"));

    let reloaded = HistoryStore::load(&history_path);
    assert_eq!(reloaded.entries(SendMode::Text), ["hello"]);
    assert_eq!(reloaded.entries(SendMode::Hex), ["AA BB"]);
}
