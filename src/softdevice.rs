//! Transport adapter over the Nordic S140 SoftDevice.
//!
//! The core issues requests synchronously through [`SoftdeviceTransport`],
//! which only queues them. [`ble_task`] owns the radio: it executes queued
//! requests with `nrf-softdevice` and feeds every completion back into the
//! shared [`Central`].
//!
//! Control requests and console writes travel on separate queues so a
//! backlog of user traffic can never starve discovery or the rescan that
//! follows a disconnect.
//!
//! The SoftDevice has no public "first attribute of this type in range"
//! primitive, so the UART service is mirrored once per connection with
//! `gatt_client::discover` and range queries are answered from the mirror.

use core::cell::RefCell;

use ble_uart_central::ble::attribute::{
    Attribute, AttributeKind, AttributeTable, DiscoverRequest,
};
use ble_uart_central::ble::central::{Central, Link};
use ble_uart_central::ble::subscription::SubscribeParams;
use ble_uart_central::ble::transport::{ScanParams, Transport};
use ble_uart_central::ble::{adv_parser, Address, ConnHandle, ConnectStatus, DisconnectReason};
use ble_uart_central::config::{self, CentralConfig, MAX_PAYLOAD_LEN, MIRROR_ATTRIBUTES_MAX};
use ble_uart_central::console::LogSink;
use ble_uart_central::error::{Error, TransportError};
use defmt::{debug, info, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration, Timer};
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{
    self, Characteristic, Descriptor, DiscoverError, HvxType, WriteError,
};
use nrf_softdevice::ble::{central, AddressType, Connection, Uuid};
use nrf_softdevice::{raw, Softdevice};

/// `BLE_CONN_HANDLE_INVALID`
const INVALID_CONN_HANDLE: u16 = 0xFFFF;

/// HCI "connection failed to be established".
const HCI_CONN_FAILED: u8 = 0x3E;

pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

pub type FirmwareCentral = Central<'static, SoftdeviceTransport, LogSink>;

pub type SharedCentral = Mutex<CriticalSectionRawMutex, RefCell<FirmwareCentral>>;

/// Control operation queued by the core for the BLE task.
#[derive(Clone, defmt::Format)]
pub enum Request {
    StartScan(ScanParams),
    Connect(Address),
    Discover(ConnHandle, DiscoverRequest),
    Subscribe(ConnHandle, SubscribeParams),
}

/// Write command queued by the console.
#[derive(defmt::Format)]
pub struct Outgoing {
    conn: ConnHandle,
    value_handle: u16,
    payload: Payload,
}

static REQUESTS: Channel<CriticalSectionRawMutex, Request, { config::REQUEST_QUEUE_DEPTH }> =
    Channel::new();

static WRITES: Channel<CriticalSectionRawMutex, Outgoing, { config::WRITE_QUEUE_DEPTH }> =
    Channel::new();

/// Handle onto the request queue. Usable from any task.
#[derive(Clone, Copy)]
pub struct SoftdeviceTransport;

impl SoftdeviceTransport {
    fn queue(&self, request: Request) -> Result<(), TransportError> {
        REQUESTS.try_send(request).map_err(|_| TransportError::NO_MEMORY)
    }
}

impl Transport for SoftdeviceTransport {
    fn start_scan(&self, params: &ScanParams) -> Result<(), TransportError> {
        self.queue(Request::StartScan(*params))
    }

    fn stop_scan(&self) -> Result<(), TransportError> {
        // The scan callback returns as soon as the central starts connecting.
        Ok(())
    }

    fn connect(&self, address: &Address) -> Result<(), TransportError> {
        self.queue(Request::Connect(*address))
    }

    fn release(&self, _conn: ConnHandle) {
        // The SoftDevice frees a failed connection attempt on its own.
    }

    fn discover(&self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), TransportError> {
        self.queue(Request::Discover(conn, *request))
    }

    fn subscribe(&self, conn: ConnHandle, params: &SubscribeParams) -> Result<(), TransportError> {
        self.queue(Request::Subscribe(conn, *params))
    }

    fn write_without_response(
        &self,
        conn: ConnHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let payload = Payload::from_slice(data).map_err(|_| TransportError::INVALID)?;
        WRITES
            .try_send(Outgoing {
                conn,
                value_handle,
                payload,
            })
            .map_err(|_| TransportError::NO_MEMORY)
    }
}

/// One notification lifted out of the SoftDevice event.
pub struct Notification {
    handle: u16,
    payload: Payload,
}

/// Copy of the peer's UART service attributes, collected by
/// `gatt_client::discover`.
pub struct AttributeMirror {
    targets: CentralConfig,
    table: AttributeTable<MIRROR_ATTRIBUTES_MAX>,
}

impl AttributeMirror {
    fn empty() -> Self {
        Self {
            targets: CentralConfig::new(),
            table: AttributeTable::new(),
        }
    }

    fn find(&self, request: &DiscoverRequest) -> Option<Attribute> {
        self.table.find(request)
    }

    fn record(&mut self, kind: AttributeKind, uuid: u16, attribute: Attribute) {
        if !self.table.push(kind, uuid, attribute) {
            warn!("softdevice: attribute mirror full, {:#x} dropped", attribute.handle);
        }
    }
}

fn matches_uuid(uuid: Option<Uuid>, candidate: u16) -> bool {
    uuid == Some(Uuid::new_16(candidate))
}

impl gatt_client::Client for AttributeMirror {
    type Event = Notification;

    fn on_hvx(
        &self,
        _conn: &Connection,
        type_: HvxType,
        handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        if type_ != HvxType::Notification {
            return None;
        }
        let len = data.len().min(MAX_PAYLOAD_LEN);
        let mut payload = Payload::new();
        let _ = payload.extend_from_slice(&data[..len]);
        Some(Notification { handle, payload })
    }

    fn uuid() -> Uuid {
        Uuid::new_16(config::UART_SERVICE_UUID)
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self::empty()
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &Characteristic,
        descriptors: &[Descriptor],
    ) {
        if self.table.is_empty() {
            // The service declaration sits right before its first
            // characteristic declaration.
            let service = characteristic.handle_decl.saturating_sub(1);
            self.record(
                AttributeKind::PrimaryService,
                self.targets.service_uuid,
                Attribute::service(service),
            );
        }

        for uuid in [self.targets.notify_char_uuid, self.targets.write_char_uuid] {
            if matches_uuid(characteristic.uuid, uuid) {
                self.record(
                    AttributeKind::Characteristic,
                    uuid,
                    Attribute::characteristic(characteristic.handle_decl, characteristic.handle_value),
                );
            }
        }

        for descriptor in descriptors {
            if matches_uuid(descriptor.uuid, self.targets.ccc_uuid) {
                self.record(
                    AttributeKind::Descriptor,
                    self.targets.ccc_uuid,
                    Attribute::descriptor(descriptor.handle),
                );
            }
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        debug!("softdevice: mirrored {} attributes", self.table.len());
        Ok(())
    }
}

pub fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: config::BLE_ATT_MTU,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: Default::default(),
        }),
        ..Default::default()
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

fn with_central<R>(shared: &SharedCentral, f: impl FnOnce(&mut FirmwareCentral) -> R) -> R {
    shared.lock(|cell| f(&mut cell.borrow_mut()))
}

fn report(result: Result<(), Error>) {
    if let Err(e) = result {
        debug!("softdevice: core reported {:?}", e);
    }
}

fn report_type(type_: &raw::ble_gap_adv_report_type_t) -> u8 {
    if type_.scan_response() != 0 {
        adv_parser::SCAN_RSP
    } else if type_.connectable() == 0 {
        if type_.scannable() != 0 {
            adv_parser::ADV_SCAN_IND
        } else {
            adv_parser::ADV_NONCONN_IND
        }
    } else if type_.directed() != 0 {
        adv_parser::ADV_DIRECT_IND
    } else {
        adv_parser::ADV_IND
    }
}

fn sd_address(address: &Address) -> nrf_softdevice::ble::Address {
    let kind = match address.kind {
        0 => AddressType::Public,
        1 => AddressType::RandomStatic,
        2 => AddressType::RandomPrivateResolvable,
        _ => AddressType::RandomPrivateNonResolvable,
    };
    nrf_softdevice::ble::Address::new(kind, address.bytes)
}

/// Executes queued requests for the lifetime of the firmware.
#[embassy_executor::task]
pub async fn ble_task(sd: &'static Softdevice, shared: &'static SharedCentral) -> ! {
    report(with_central(shared, |c| c.start()));

    loop {
        match REQUESTS.receive().await {
            Request::StartScan(params) => scan(sd, shared, &params).await,
            Request::Connect(address) => {
                connect_and_run(sd, shared, address).await;
                // Writes queued for the dropped link have no target left.
                while WRITES.try_receive().is_ok() {}
            }
            other => debug!("softdevice: no link, dropping {:?}", other),
        }

        // A rescan that could not be queued leaves the core idle with
        // nothing left to wake this loop.
        report(with_central(shared, |c| c.start()));
    }
}

async fn scan(sd: &Softdevice, shared: &SharedCentral, params: &ScanParams) {
    let scan_cfg = central::ScanConfig {
        active: params.active,
        interval: u32::from(params.interval),
        window: u32::from(params.window),
        ..Default::default()
    };

    let result = central::scan(sd, &scan_cfg, |report| {
        let data =
            unsafe { core::slice::from_raw_parts(report.data.p_data, report.data.len as usize) };
        let address = Address::new(report.peer_addr.addr_type(), report.peer_addr.addr);
        let adv_type = report_type(&report.type_);

        with_central(shared, |c| {
            if let Err(e) = c.on_device_observed(address, adv_type, data) {
                warn!("softdevice: report handling failed: {:?}", e);
            }
            // Return Some(()) to stop scanning.
            matches!(c.link(), Link::Connecting(_)).then_some(())
        })
    })
    .await;

    if let Err(e) = result {
        warn!("softdevice: scan ended with error {:?}, retrying", e);
        Timer::after(Duration::from_secs(1)).await;
        REQUESTS.send(Request::StartScan(*params)).await;
    }
}

async fn connect_and_run(sd: &Softdevice, shared: &SharedCentral, address: Address) {
    let peer = sd_address(&address);
    let whitelist = [&peer];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let conn = match central::connect(sd, &conn_cfg).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("softdevice: connect failed: {:?}", e);
            report(with_central(shared, |c| {
                c.on_connected(
                    ConnHandle(INVALID_CONN_HANDLE),
                    ConnectStatus::Failed(HCI_CONN_FAILED),
                )
            }));
            return;
        }
    };

    let handle = ConnHandle(conn.handle().unwrap_or(INVALID_CONN_HANDLE));
    report(with_central(shared, |c| {
        c.on_connected(handle, ConnectStatus::Success)
    }));

    run_link(&conn, handle, shared).await;

    // The binding signals the end of the link without the HCI reason.
    report(with_central(shared, |c| {
        c.on_disconnected(handle, DisconnectReason::UNKNOWN)
    }));
}

/// Forward notifications of `conn` while serving its requests. Returns
/// once the link is gone.
async fn run_link(conn: &Connection, handle: ConnHandle, shared: &SharedCentral) {
    // One listener for the whole link; only its `on_hvx` is used.
    let listener = AttributeMirror::empty();
    let notifications = gatt_client::run(conn, &listener, |n: Notification| {
        let delivery = with_central(shared, |c| c.on_notification(handle, n.handle, &n.payload));
        if let Err(e) = delivery {
            debug!("softdevice: notification dropped: {:?}", e);
        }
    });

    match select(notifications, serve_link(conn, handle, shared)).await {
        Either::First(_) => info!("softdevice: link closed (conn {})", handle.0),
        Either::Second(never) => match never {},
    }
}

/// Execute control requests and writes for `conn`, one at a time.
async fn serve_link(conn: &Connection, handle: ConnHandle, shared: &SharedCentral) -> ! {
    let mut mirror = AttributeMirror::empty();
    let mut mirrored = false;

    loop {
        match select(REQUESTS.receive(), WRITES.receive()).await {
            Either::First(Request::Discover(h, query)) if h == handle => {
                if !mirrored {
                    let timeout = Duration::from_millis(config::DISCOVERY_TIMEOUT_MS);
                    match with_timeout(timeout, gatt_client::discover::<AttributeMirror>(conn)).await {
                        Ok(Ok(found)) => mirror = found,
                        Ok(Err(DiscoverError::ServiceNotFound)) => {
                            info!("softdevice: peer has no UART service");
                        }
                        Ok(Err(e)) => warn!("softdevice: discovery failed: {:?}", e),
                        Err(_) => {
                            report(with_central(shared, |c| c.on_discovery_timeout(handle)));
                            continue;
                        }
                    }
                    mirrored = true;
                }
                let found = mirror.find(&query);
                report(with_central(shared, |c| c.on_discovery_response(handle, found)));
            }
            Either::First(Request::Subscribe(h, params)) if h == handle => {
                let value = params.value.to_le_bytes();
                let result = gatt_client::write(conn, params.ccc_handle, &value)
                    .await
                    .map_err(|e| {
                        warn!("softdevice: CCC write failed: {:?}", e);
                        match e {
                            WriteError::Disconnected => TransportError::NOT_CONNECTED,
                            _ => TransportError::INVALID,
                        }
                    });
                report(with_central(shared, |c| c.on_subscribe_complete(handle, result)));
            }
            Either::First(other) => debug!("softdevice: dropping stale {:?}", other),
            Either::Second(out) if out.conn == handle => {
                if let Err(e) =
                    gatt_client::try_write_without_response(conn, out.value_handle, &out.payload)
                {
                    warn!("softdevice: write cmd failed: {:?}", e);
                }
            }
            Either::Second(out) => debug!("softdevice: dropping stale write for conn {}", out.conn.0),
        }
    }
}
