//! Recording transport and sink for host unit tests.

use std::cell::{Cell, RefCell};
use std::vec::Vec;

use super::attribute::DiscoverRequest;
use super::subscription::{NotificationSink, SubscribeParams};
use super::transport::{ScanParams, Transport};
use super::{Address, ConnHandle};
use crate::error::TransportError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    StartScan,
    StopScan,
    Connect(Address),
    Release(ConnHandle),
    Discover(ConnHandle, DiscoverRequest),
    Subscribe(ConnHandle, SubscribeParams),
    Write(ConnHandle, u16, Vec<u8>),
}

#[derive(Default)]
pub struct MockTransport {
    calls: RefCell<Vec<Call>>,
    scan_err: Cell<Option<TransportError>>,
    stop_err: Cell<Option<TransportError>>,
    connect_err: Cell<Option<TransportError>>,
    discover_err: Cell<Option<TransportError>>,
    subscribe_err: Cell<Option<TransportError>>,
    write_err: Cell<Option<TransportError>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        self.calls.borrow_mut().drain(..).collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn fail_scan(&self, e: TransportError) {
        self.scan_err.set(Some(e));
    }

    pub fn fail_stop(&self, e: TransportError) {
        self.stop_err.set(Some(e));
    }

    pub fn fail_connect(&self, e: TransportError) {
        self.connect_err.set(Some(e));
    }

    pub fn fail_discover(&self, e: TransportError) {
        self.discover_err.set(Some(e));
    }

    pub fn fail_subscribe(&self, e: TransportError) {
        self.subscribe_err.set(Some(e));
    }

    pub fn fail_write(&self, e: TransportError) {
        self.write_err.set(Some(e));
    }

    fn record(&self, call: Call, err: &Cell<Option<TransportError>>) -> Result<(), TransportError> {
        self.calls.borrow_mut().push(call);
        match err.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Transport for MockTransport {
    fn start_scan(&self, _params: &ScanParams) -> Result<(), TransportError> {
        self.record(Call::StartScan, &self.scan_err)
    }

    fn stop_scan(&self) -> Result<(), TransportError> {
        self.record(Call::StopScan, &self.stop_err)
    }

    fn connect(&self, address: &Address) -> Result<(), TransportError> {
        self.record(Call::Connect(*address), &self.connect_err)
    }

    fn release(&self, conn: ConnHandle) {
        self.calls.borrow_mut().push(Call::Release(conn));
    }

    fn discover(&self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), TransportError> {
        self.record(Call::Discover(conn, *request), &self.discover_err)
    }

    fn subscribe(&self, conn: ConnHandle, params: &SubscribeParams) -> Result<(), TransportError> {
        self.record(Call::Subscribe(conn, *params), &self.subscribe_err)
    }

    fn write_without_response(
        &self,
        conn: ConnHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.record(Call::Write(conn, value_handle, data.to_vec()), &self.write_err)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub payloads: Vec<Vec<u8>>,
}

impl NotificationSink for RecordingSink {
    fn on_notification(&mut self, _value_handle: u16, payload: &[u8]) {
        self.payloads.push(payload.to_vec());
    }
}
