//! Host-surface tests: every operation keyed by port identifier, boundary
//! validation of raw numeric selectors, and fan-out of received data through
//! the manager-wide handler.

mod common;

use common::{assert_no_delivery, recv_one, TestHarness};
use serial_port_engine::{LineConfig, PortError, PortState};

#[test]
fn test_identifier_keyed_round_trip() {
    let harness = TestHarness::new();
    let device = harness.device("COM3");
    let rx = harness.collect_data();

    harness.manager.open("COM3", LineConfig::default()).unwrap();

    device.push_frame(b"inbound");
    let (name, bytes) = recv_one(&rx, "tagged chunk");
    assert_eq!(name, "COM3");
    assert_eq!(bytes, b"inbound".to_vec());

    assert_eq!(harness.manager.write("COM3", b"outbound").unwrap(), 8);
    assert_eq!(device.written(), b"outbound");

    harness.manager.close("COM3").unwrap();
    assert!(harness.manager.status("COM3").is_none());
    assert!(matches!(
        harness.manager.write("COM3", b"late"),
        Err(PortError::NotOpen)
    ));
}

#[test]
fn test_unknown_identifiers() {
    let harness = TestHarness::new();

    assert!(matches!(
        harness.manager.write("COM404", b"x"),
        Err(PortError::NotOpen)
    ));
    assert!(harness.manager.status("COM404").is_none());
    // Closing something that was never opened is a no-op.
    harness.manager.close("COM404").unwrap();
    assert!(matches!(
        harness.manager.open("COM404", LineConfig::default()),
        Err(PortError::NotFound(_))
    ));
}

#[test]
fn test_open_raw_accepts_dcb_style_selectors() {
    let harness = TestHarness::new();
    harness.device("COM3");

    // 115200 baud, 7 data bits, two stop bits, even parity, software flow.
    harness.manager.open_raw("COM3", 115_200, 7, 2, 2, 1).unwrap();

    let settings = harness.factory.last_settings().unwrap();
    assert_eq!(settings.baud_rate, 115_200);
    assert_eq!(settings.char_size, 7);
    assert!(settings.parity_check);
    assert!(settings.sw_flow_out && settings.sw_flow_in);
    assert!(!settings.hw_flow_out);
}

#[test]
fn test_open_raw_rejects_each_bad_selector() {
    let harness = TestHarness::new();
    harness.device("COM3");

    let cases: [(u32, u8, u8, u8, u8); 5] = [
        (0, 8, 0, 0, 0),    // zero baud
        (9600, 4, 0, 0, 0), // data bits out of range
        (9600, 8, 3, 0, 0), // stop-bit selector out of range
        (9600, 8, 0, 5, 0), // parity selector out of range
        (9600, 8, 0, 0, 3), // flow selector out of range
    ];
    for (baud, data, stop, parity, flow) in cases {
        let err = harness
            .manager
            .open_raw("COM3", baud, data, stop, parity, flow)
            .unwrap_err();
        assert!(
            matches!(err, PortError::InvalidConfig(_)),
            "selectors ({baud},{data},{stop},{parity},{flow}) must fail validation, got {err:?}"
        );
    }

    assert_eq!(harness.factory.open_count(), 0, "core must not be reached");
    assert!(harness.manager.open_ports().is_empty());
}

#[test]
fn test_ports_route_independently() {
    let harness = TestHarness::new();
    let dev_a = harness.device("ttyUSB0");
    let dev_b = harness.device("ttyUSB1");
    let rx = harness.collect_data();

    harness.manager.open("ttyUSB0", LineConfig::default()).unwrap();
    harness.manager.open("ttyUSB1", LineConfig::default()).unwrap();

    dev_a.push_frame(b"from A");
    let (name, bytes) = recv_one(&rx, "chunk from A");
    assert_eq!((name.as_str(), bytes.as_slice()), ("ttyUSB0", b"from A".as_slice()));

    harness.manager.close("ttyUSB0").unwrap();

    // Closing one port must not disturb the other.
    dev_b.push_frame(b"from B");
    let (name, bytes) = recv_one(&rx, "chunk from B");
    assert_eq!((name.as_str(), bytes.as_slice()), ("ttyUSB1", b"from B".as_slice()));

    assert_eq!(harness.manager.open_ports(), vec!["ttyUSB1".to_string()]);
    harness.manager.close_all().unwrap();
}

#[test]
fn test_concurrent_writers_on_distinct_ports() {
    let harness = TestHarness::new();
    let dev_a = harness.device("ttyUSB0");
    let dev_b = harness.device("ttyUSB1");

    harness.manager.open("ttyUSB0", LineConfig::default()).unwrap();
    harness.manager.open("ttyUSB1", LineConfig::default()).unwrap();

    let manager = &harness.manager;
    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..50 {
                manager.write("ttyUSB0", b"aaaa").unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                manager.write("ttyUSB1", b"bb").unwrap();
            }
        });
    });

    assert_eq!(dev_a.written().len(), 50 * 4);
    assert_eq!(dev_b.written().len(), 50 * 2);
    harness.manager.close_all().unwrap();
}

#[test]
fn test_reopen_replaces_without_duplicate_delivery() {
    let harness = TestHarness::new();
    let device = harness.device("COM3");
    let rx = harness.collect_data();

    harness.manager.open("COM3", LineConfig::default()).unwrap();
    let faster = LineConfig {
        baud_rate: 230_400,
        ..LineConfig::default()
    };
    harness.manager.open("COM3", faster).unwrap();

    assert_eq!(harness.factory.open_count(), 2);
    assert_eq!(harness.manager.status("COM3").unwrap().config, Some(faster));

    // Exactly one live reader: each frame arrives exactly once.
    device.push_frame(b"once");
    let (_, bytes) = recv_one(&rx, "single delivery");
    assert_eq!(bytes, b"once".to_vec());
    assert_no_delivery(&rx, "duplicate delivery after reopen");

    harness.manager.close_all().unwrap();
}

#[test]
fn test_close_all_silences_everything() {
    let harness = TestHarness::new();
    let dev_a = harness.device("COM3");
    let dev_b = harness.device("COM4");
    let rx = harness.collect_data();

    harness.manager.open("COM3", LineConfig::default()).unwrap();
    harness.manager.open("COM4", LineConfig::default()).unwrap();

    harness.manager.close_all().unwrap();
    assert!(harness.manager.open_ports().is_empty());

    dev_a.push_frame(b"too late");
    dev_b.push_frame(b"too late");
    assert_no_delivery(&rx, "chunk after close_all");

    // Idempotent, like single-port close.
    harness.manager.close_all().unwrap();
}

#[test]
fn test_status_reflects_lifecycle() {
    let harness = TestHarness::new();
    harness.device("COM3");

    assert!(harness.manager.status("COM3").is_none());

    harness.manager.open("COM3", LineConfig::default()).unwrap();
    let status = harness.manager.status("COM3").unwrap();
    assert_eq!(status.state, PortState::Open);
    assert_eq!(status.config, Some(LineConfig::default()));

    harness.manager.close("COM3").unwrap();
    assert!(harness.manager.status("COM3").is_none());
}
