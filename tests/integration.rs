//! Integration tests: the central driven end to end against the simulated
//! echo peripheral through a loopback transport.

use std::cell::RefCell;
use std::collections::VecDeque;

use ble_uart_central::ble::attribute::DiscoverRequest;
use ble_uart_central::ble::central::{Central, Link};
use ble_uart_central::ble::discovery::Phase;
use ble_uart_central::ble::gateway::WriteGateway;
use ble_uart_central::ble::subscription::{NotificationSink, SubscribeParams};
use ble_uart_central::ble::transport::{ScanParams, Transport};
use ble_uart_central::ble::{adv_parser, Address, ConnHandle, ConnectStatus, DisconnectReason};
use ble_uart_central::config::{CentralConfig, CONSOLE_LINE_MAX};
use ble_uart_central::console::{LineBuffer, LogSink};
use ble_uart_central::error::{Error, TransportError};
use ble_uart_central::peripheral::{EchoPeripheral, ADVERTISEMENT};

const PEER: Address = Address::new(1, [0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xC0]);
const CONN: ConnHandle = ConnHandle(0);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ═══════════════════════════════════════════════════════════════════════════
// Loopback transport
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Op {
    StartScan,
    Connect(Address),
    Discover(ConnHandle, DiscoverRequest),
    Subscribe(ConnHandle, SubscribeParams),
    Write(ConnHandle, u16, Vec<u8>),
}

#[derive(Default)]
struct Loopback {
    ops: RefCell<VecDeque<Op>>,
}

impl Loopback {
    fn pop(&self) -> Option<Op> {
        self.ops.borrow_mut().pop_front()
    }

    fn push(&self, op: Op) -> Result<(), TransportError> {
        self.ops.borrow_mut().push_back(op);
        Ok(())
    }
}

impl Transport for Loopback {
    fn start_scan(&self, _params: &ScanParams) -> Result<(), TransportError> {
        self.push(Op::StartScan)
    }

    fn stop_scan(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn connect(&self, address: &Address) -> Result<(), TransportError> {
        self.push(Op::Connect(*address))
    }

    fn release(&self, _conn: ConnHandle) {}

    fn discover(&self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), TransportError> {
        self.push(Op::Discover(conn, *request))
    }

    fn subscribe(&self, conn: ConnHandle, params: &SubscribeParams) -> Result<(), TransportError> {
        self.push(Op::Subscribe(conn, *params))
    }

    fn write_without_response(
        &self,
        conn: ConnHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.push(Op::Write(conn, value_handle, data.to_vec()))
    }
}

#[derive(Default)]
struct Collect {
    lines: Vec<Vec<u8>>,
}

impl NotificationSink for Collect {
    fn on_notification(&mut self, _value_handle: u16, payload: &[u8]) {
        self.lines.push(payload.to_vec());
    }
}

/// Deliver queued operations to the peripheral until the queue drains.
fn pump<S: NotificationSink>(
    central: &mut Central<'_, Loopback, S>,
    peripheral: &mut EchoPeripheral,
) {
    while let Some(op) = central.transport().pop() {
        let _ = match op {
            Op::StartScan => {
                central.on_device_observed(PEER, adv_parser::ADV_IND, &ADVERTISEMENT)
            }
            Op::Connect(_) => central.on_connected(CONN, ConnectStatus::Success),
            Op::Discover(conn, request) => {
                let found = peripheral.discover(&request);
                central.on_discovery_response(conn, found)
            }
            Op::Subscribe(conn, params) => {
                let written = peripheral.write_ccc(params.ccc_handle, params.value);
                let result = if written { Ok(()) } else { Err(TransportError::INVALID) };
                central.on_subscribe_complete(conn, result)
            }
            Op::Write(conn, handle, data) => {
                if let Some(echo) = peripheral.write(handle, &data) {
                    let notify = peripheral.layout().notify_value;
                    let _ = central.on_notification(conn, notify, &echo);
                }
                Ok(())
            }
        };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// End-to-end
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn lowercase_line_comes_back_uppercased() {
    init_logger();
    let gateway = WriteGateway::new();
    let mut peripheral = EchoPeripheral::new(0x0010);
    let mut central = Central::new(
        CentralConfig::new(),
        Loopback::default(),
        Collect::default(),
        &gateway,
    );

    central.start().unwrap();
    pump(&mut central, &mut peripheral);
    assert_eq!(central.phase(), Some(Phase::Done));
    assert!(central.is_subscribed());
    assert!(peripheral.notify_enabled());

    central.write(b"hello, world 42").unwrap();
    pump(&mut central, &mut peripheral);
    assert_eq!(central.sink().lines, vec![b"HELLO, WORLD 42".to_vec()]);
}

#[test]
fn console_lines_feed_the_gateway() {
    init_logger();
    let gateway = WriteGateway::new();
    let mut peripheral = EchoPeripheral::new(0x0020);
    let mut central = Central::new(
        CentralConfig::new(),
        Loopback::default(),
        Collect::default(),
        &gateway,
    );
    central.start().unwrap();
    pump(&mut central, &mut peripheral);

    let mut line: LineBuffer<CONSOLE_LINE_MAX> = LineBuffer::new();
    for &b in b"abc\r\nMiXeD\n".iter() {
        if let Some(data) = line.push(b) {
            gateway.write(central.transport(), data).unwrap();
        }
    }
    pump(&mut central, &mut peripheral);

    assert_eq!(
        central.sink().lines,
        vec![b"ABC".to_vec(), b"MIXED".to_vec()]
    );
}

#[test]
fn empty_echo_reads_as_unsubscribe() {
    init_logger();
    let gateway = WriteGateway::new();
    let mut peripheral = EchoPeripheral::new(0x0010);
    let mut central = Central::new(
        CentralConfig::new(),
        Loopback::default(),
        Collect::default(),
        &gateway,
    );
    central.start().unwrap();
    pump(&mut central, &mut peripheral);

    central.write(&[]).unwrap();
    pump(&mut central, &mut peripheral);
    assert!(!central.is_subscribed());

    // Writes still go out, but echoes are no longer delivered.
    central.write(b"after").unwrap();
    pump(&mut central, &mut peripheral);
    assert!(central.sink().lines.is_empty());
}

#[test]
fn reconnect_after_mid_discovery_disconnect() {
    init_logger();
    let gateway = WriteGateway::new();
    let mut peripheral = EchoPeripheral::new(0x0010);
    let mut central = Central::new(
        CentralConfig::new(),
        Loopback::default(),
        Collect::default(),
        &gateway,
    );
    central.start().unwrap();

    // Scan, connect and answer the service query only.
    for _ in 0..3 {
        let op = central.transport().pop().unwrap();
        let _ = match op {
            Op::StartScan => central.on_device_observed(PEER, adv_parser::ADV_IND, &ADVERTISEMENT),
            Op::Connect(_) => central.on_connected(CONN, ConnectStatus::Success),
            Op::Discover(conn, request) => {
                central.on_discovery_response(conn, peripheral.discover(&request))
            }
            other => panic!("unexpected {:?}", other),
        };
    }
    assert_eq!(central.phase(), Some(Phase::FindNotifyChar));

    // The notify query is in flight when the link drops.
    let in_flight = central.transport().pop().unwrap();
    central
        .on_disconnected(CONN, DisconnectReason::CONNECTION_TIMEOUT)
        .unwrap();
    peripheral.disconnect();
    assert!(matches!(central.link(), Link::Scanning));

    if let Op::Discover(conn, request) = in_flight {
        assert_eq!(
            central.on_discovery_response(conn, peripheral.discover(&request)),
            Err(Error::StaleEvent)
        );
    } else {
        panic!("expected discovery in flight");
    }

    pump(&mut central, &mut peripheral);
    assert!(central.is_subscribed());
    central.write(b"back").unwrap();
    pump(&mut central, &mut peripheral);
    assert_eq!(central.sink().lines, vec![b"BACK".to_vec()]);
}

#[test]
fn missing_characteristic_leaves_link_unusable() {
    init_logger();
    let gateway = WriteGateway::new();
    let mut peripheral = EchoPeripheral::new(0x0010);
    let config = CentralConfig {
        notify_char_uuid: 0xFFF1,
        ..CentralConfig::new()
    };
    let mut central = Central::new(config, Loopback::default(), Collect::default(), &gateway);
    central.start().unwrap();
    pump(&mut central, &mut peripheral);

    assert_eq!(central.phase(), Some(Phase::Aborted));
    assert!(!central.is_subscribed());
    assert!(!peripheral.notify_enabled());
    assert_eq!(central.write(b"x"), Err(Error::NotConnected));
}

#[test]
fn log_sink_receives_echoes() {
    init_logger();
    let gateway = WriteGateway::new();
    let mut peripheral = EchoPeripheral::new(0x0010);
    let mut central = Central::new(
        CentralConfig::new(),
        Loopback::default(),
        LogSink::new(),
        &gateway,
    );
    central.start().unwrap();
    pump(&mut central, &mut peripheral);

    central.write(b"one").unwrap();
    central.write(b"two\x00").unwrap();
    pump(&mut central, &mut peripheral);
    assert_eq!(central.sink().received(), 2);
}
