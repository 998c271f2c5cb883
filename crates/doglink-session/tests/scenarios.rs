//! End-to-end DOG behaviour, bytes in and bytes out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use doglink_frame::{encode, Address, ApiKind, Frame, FrameReader, FrameWriter, PacketType};
use doglink_session::{
    decode_stream, run_node, Actuation, DriveCommand, Node, SessionConfig, SessionPhase,
    StaticTelemetry, StopReason,
};
use doglink_transport::{LinkEvent, UnixDomainSocket};

const FARMER: Address = Address::new(0x21, 0x8B);
const TAG: u8 = 7;
const IMU: [u8; 12] = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, 0x90, 0xA0, 0xB0, 0xC0];

#[derive(Debug, Default)]
struct Craft {
    active: bool,
    key_seen: bool,
    commands: Vec<DriveCommand>,
}

impl Actuation for Craft {
    fn activate(&mut self) {
        self.active = true;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.key_seen = false;
    }

    fn apply_command(&mut self, command: &DriveCommand) {
        self.commands.push(*command);
    }

    fn session_active(&mut self) {
        self.key_seen = true;
    }
}

type TestNode = Node<Craft, StaticTelemetry, Vec<u8>>;

fn node() -> TestNode {
    let config = SessionConfig {
        own_tag: TAG,
        ..SessionConfig::default()
    };
    Node::new(&config, Craft::default(), StaticTelemetry(IMU), Vec::new())
}

fn key() -> [u8; 32] {
    let mut key = [0u8; 32];
    for (i, b) in key.iter_mut().enumerate() {
        *b = (i as u8) * 7 + 1;
    }
    key
}

fn from_farmer(packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
    encode(ApiKind::Command, FARMER, packet_type, payload)
        .unwrap()
        .to_vec()
}

fn deliver(node: &mut TestNode, wire: &[u8]) {
    for &byte in wire {
        node.handle(LinkEvent::ByteReceived(byte)).unwrap();
    }
}

/// Let the transmitter finish and return every frame written so far.
fn transmitted(node: &mut TestNode) -> Vec<Frame> {
    while !node.transmitter().is_idle() {
        node.handle(LinkEvent::ByteSent).unwrap();
    }
    let wire = std::mem::take(node.sink_mut());
    let mut reader = FrameReader::new(std::io::Cursor::new(wire));
    std::iter::from_fn(|| reader.read_frame().ok()).collect()
}

fn pair(node: &mut TestNode) {
    deliver(node, &from_farmer(PacketType::PairRequest, &[TAG]));
    deliver(node, &from_farmer(PacketType::EncryptionKey, &key()));
    transmitted(node);
    assert_eq!(node.phase(), SessionPhase::Paired);
}

#[test]
fn pairing_bytes_one_at_a_time_queue_an_ack() {
    let mut n = node();
    let wire = from_farmer(PacketType::PairRequest, &[TAG]);
    assert_eq!(&wire[..3], &[0x7E, 0x00, 0x07]);

    deliver(&mut n, &wire);

    assert_eq!(n.phase(), SessionPhase::PairedAwaitingKey);
    assert!(n.session().actuation().active);
    let sent = transmitted(&mut n);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], Frame::response(FARMER, PacketType::Ack, Vec::new()));
}

#[test]
fn mismatched_tag_is_ignored() {
    let mut n = node();
    deliver(&mut n, &from_farmer(PacketType::PairRequest, &[TAG + 1]));

    assert_eq!(n.phase(), SessionPhase::WaitingToPair);
    assert!(transmitted(&mut n).is_empty());
    assert!(!n.session().actuation().active);
}

#[test]
fn key_frame_activates_session_and_reports_status() {
    let mut n = node();
    deliver(&mut n, &from_farmer(PacketType::PairRequest, &[TAG]));
    transmitted(&mut n);

    deliver(&mut n, &from_farmer(PacketType::EncryptionKey, &key()));

    assert_eq!(n.phase(), SessionPhase::Paired);
    assert_eq!(n.session().key_index(), Some(0));
    assert!(n.session().actuation().key_seen);
    let sent = transmitted(&mut n);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].packet_type(), Some(PacketType::StatusReport));
    assert_eq!(sent[0].payload(), &IMU);
}

#[test]
fn silence_past_lost_link_timeout_unpairs() {
    let mut n = node();
    pair(&mut n);

    let (ciphertext, _) = decode_stream(&key(), 0, &[0x04, 10, 20, 0]);
    n.advance_clock(2500).unwrap();
    deliver(&mut n, &from_farmer(PacketType::Command, &ciphertext));
    transmitted(&mut n);

    // The command restarted the timer at t=2500.
    n.advance_clock(5400).unwrap();
    assert_eq!(n.phase(), SessionPhase::Paired);
    n.advance_clock(5500).unwrap();

    assert_eq!(n.phase(), SessionPhase::WaitingToPair);
    assert_eq!(n.session().peer(), None);
    assert!(!n.session().actuation().active);
}

#[test]
fn corrupted_checksum_emits_nothing() {
    let mut n = node();
    let mut wire = from_farmer(PacketType::PairRequest, &[TAG]);
    let last = wire.len() - 1;
    wire[last] ^= 0x5A;

    deliver(&mut n, &wire);

    assert_eq!(n.receiver().phase(), doglink_frame::ReceivePhase::WaitForStart);
    assert_eq!(n.phase(), SessionPhase::WaitingToPair);
    assert!(transmitted(&mut n).is_empty());
}

#[test]
fn command_stream_and_resync() {
    let mut n = node();
    pair(&mut n);
    let k = key();

    let (c0, _) = decode_stream(&k, 0, &[0x04, 0x80, 0x10, 0x02]);
    deliver(&mut n, &from_farmer(PacketType::Command, &c0));
    assert_eq!(transmitted(&mut n)[0].packet_type(), Some(PacketType::StatusReport));

    // FARMER lost a command and is ahead by four bytes.
    let (skewed, _) = decode_stream(&k, 8, &[0x04, 0, 0, 0]);
    deliver(&mut n, &from_farmer(PacketType::Command, &skewed));
    assert_eq!(
        transmitted(&mut n)[0].packet_type(),
        Some(PacketType::ResetEncryption)
    );
    assert_eq!(n.session().key_index(), Some(0));

    let (c1, _) = decode_stream(&k, 0, &[0x04, 0x81, 0x11, 0x01]);
    deliver(&mut n, &from_farmer(PacketType::Command, &c1));
    transmitted(&mut n);

    let cmds = &n.session().actuation().commands;
    assert_eq!(cmds.len(), 2);
    assert!(cmds[0].peripheral && !cmds[0].brake);
    assert!(cmds[1].brake && !cmds[1].peripheral);
}

#[test]
fn repeated_delivery_failure_unpairs() {
    let mut n = node();
    deliver(&mut n, &from_farmer(PacketType::PairRequest, &[TAG]));
    assert_eq!(transmitted(&mut n).len(), 1);

    let failure = Frame::TxResult {
        frame_id: 0x01,
        status: 0x01,
    }
    .to_wire()
    .unwrap();

    deliver(&mut n, &failure);
    deliver(&mut n, &failure);
    assert_eq!(transmitted(&mut n).len(), 2);
    assert_eq!(n.phase(), SessionPhase::PairedAwaitingKey);

    deliver(&mut n, &failure);
    assert!(transmitted(&mut n).is_empty());
    assert_eq!(n.phase(), SessionPhase::WaitingToPair);
}

#[test]
fn operator_keys_ack_and_unpair() {
    let mut n = node();
    pair(&mut n);

    n.handle(LinkEvent::KeyPressed('d')).unwrap();
    let sent = transmitted(&mut n);
    assert_eq!(sent[0].packet_type(), Some(PacketType::Ack));

    n.handle(LinkEvent::KeyPressed('S')).unwrap();
    assert_eq!(n.phase(), SessionPhase::WaitingToPair);
    assert!(!n.session().actuation().active);
}

#[test]
#[cfg(unix)]
fn node_runs_over_unix_socket() {
    let dir = std::env::temp_dir().join(format!("doglink-node-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let sock_path = dir.join("dog.sock");
    let listener = UnixDomainSocket::bind(&sock_path).unwrap();

    let shutdown = Arc::new(AtomicBool::new(false));
    let node_shutdown = Arc::clone(&shutdown);
    let dog = std::thread::spawn(move || {
        let stream = listener.accept().unwrap();
        let config = SessionConfig {
            own_tag: TAG,
            ..SessionConfig::default()
        };
        run_node(
            stream,
            &config,
            Craft::default(),
            StaticTelemetry(IMU),
            node_shutdown,
        )
        .unwrap()
    });

    let mut stream = UnixDomainSocket::connect(&sock_path).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut reader = FrameReader::new(stream.try_clone().unwrap());
    let mut writer = FrameWriter::new(stream);

    writer
        .send(ApiKind::Command, FARMER, PacketType::PairRequest, &[TAG])
        .unwrap();
    let ack = reader.read_frame().unwrap();
    assert_eq!(ack.packet_type(), Some(PacketType::Ack));
    assert_eq!(ack.address(), Some(FARMER));

    writer
        .send(ApiKind::Command, FARMER, PacketType::EncryptionKey, &key())
        .unwrap();
    let status = reader.read_frame().unwrap();
    assert_eq!(status.payload(), &IMU);

    shutdown.store(true, Ordering::SeqCst);
    let report = dog.join().unwrap();
    assert_eq!(report.stopped_by, StopReason::Shutdown);
    assert_eq!(report.phase, SessionPhase::Paired);
    assert_eq!(report.peer.as_deref(), Some("0x218B"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
#[cfg(unix)]
fn node_stops_when_link_closes() {
    let dir = std::env::temp_dir().join(format!("doglink-node-close-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let sock_path = dir.join("dog.sock");
    let listener = UnixDomainSocket::bind(&sock_path).unwrap();

    let dog = std::thread::spawn(move || {
        let stream = listener.accept().unwrap();
        run_node(
            stream,
            &SessionConfig::default(),
            Craft::default(),
            StaticTelemetry::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap()
    });

    let stream = UnixDomainSocket::connect(&sock_path).unwrap();
    drop(stream);

    let report = dog.join().unwrap();
    assert_eq!(report.stopped_by, StopReason::LinkClosed);
    assert_eq!(report.phase, SessionPhase::WaitingToPair);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
#[cfg(unix)]
fn shutdown_releases_link_while_farmer_stays_connected() {
    let dir = std::env::temp_dir().join(format!("doglink-node-stop-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let sock_path = dir.join("dog.sock");
    let listener = UnixDomainSocket::bind(&sock_path).unwrap();

    let shutdown = Arc::new(AtomicBool::new(false));
    let node_shutdown = Arc::clone(&shutdown);
    let dog = std::thread::spawn(move || {
        let stream = listener.accept().unwrap();
        run_node(
            stream,
            &SessionConfig::default(),
            Craft::default(),
            StaticTelemetry::default(),
            node_shutdown,
        )
        .unwrap()
    });

    let mut farmer = UnixDomainSocket::connect(&sock_path).unwrap();
    // Give the DOG time to block in its link read.
    std::thread::sleep(Duration::from_millis(120));
    shutdown.store(true, Ordering::SeqCst);
    let report = dog.join().unwrap();
    assert_eq!(report.stopped_by, StopReason::Shutdown);

    // Every DOG handle on the link, the reader's clone included, is closed by now.
    farmer
        .set_read_timeout(Some(Duration::from_millis(10)))
        .unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(std::io::Read::read(&mut farmer, &mut buf).unwrap(), 0);

    let _ = std::fs::remove_dir_all(&dir);
}
