//! Connection lifecycle manager.
//!
//! Owns the single link and everything hanging off it. The link is one of:
//!
//! ```text
//! Idle --start--> Scanning --match--> Connecting --ok--> Connected(Session)
//!   ^                ^                    |                   |
//!   |                +------- fail -------+                   |
//!   +--- scan failed ---------+----------- disconnect --------+
//! ```
//!
//! A disconnect is the universal reset: the session (discovery walker,
//! subscription and published write target) is dropped and scanning
//! restarts. Every handler returns `Result<(), Error>`; errors are local to
//! the event that produced them and are already logged when returned.

use super::adv_parser;
use super::attribute::Attribute;
use super::discovery::{DiscoverySession, Phase, Step};
use super::gateway::WriteGateway;
use super::subscription::{Delivery, NotificationSink, SubscriptionState};
use super::transport::{ScanParams, Transport};
use super::{Address, ConnHandle, ConnectStatus, DisconnectReason};
use crate::config::CentralConfig;
use crate::error::{ConnectFailure, Error, TransportError};

/// Everything tied to one established connection.
#[derive(Debug)]
pub struct Session {
    conn: ConnHandle,
    discovery: DiscoverySession,
    subscription: Option<SubscriptionState>,
}

impl Session {
    fn new(conn: ConnHandle, config: CentralConfig) -> Self {
        Self {
            conn,
            discovery: DiscoverySession::new(config),
            subscription: None,
        }
    }

    pub fn conn(&self) -> ConnHandle {
        self.conn
    }

    pub fn discovery(&self) -> &DiscoverySession {
        &self.discovery
    }

    pub fn subscription(&self) -> Option<&SubscriptionState> {
        self.subscription.as_ref()
    }
}

#[derive(Debug)]
pub enum Link {
    /// Nothing running; a scan start failed or `start` was never called.
    Idle,
    Scanning,
    Connecting(Address),
    Connected(Session),
}

pub struct Central<'g, T: Transport, S: NotificationSink> {
    config: CentralConfig,
    scan_params: ScanParams,
    transport: T,
    sink: S,
    gateway: &'g WriteGateway,
    link: Link,
}

impl<'g, T: Transport, S: NotificationSink> Central<'g, T, S> {
    pub fn new(config: CentralConfig, transport: T, sink: S, gateway: &'g WriteGateway) -> Self {
        Self {
            config,
            scan_params: ScanParams::default(),
            transport,
            sink,
            gateway,
            link: Link::Idle,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.link {
            Link::Connected(session) => Some(session),
            _ => None,
        }
    }

    /// Discovery phase of the live session, if any.
    pub fn phase(&self) -> Option<Phase> {
        self.session().map(|s| s.discovery.phase())
    }

    pub fn is_subscribed(&self) -> bool {
        self.session()
            .and_then(|s| s.subscription.as_ref())
            .is_some_and(|sub| sub.is_active())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn gateway(&self) -> &'g WriteGateway {
        self.gateway
    }

    /// Begin scanning. A no-op unless the link is idle.
    pub fn start(&mut self) -> Result<(), Error> {
        match self.link {
            Link::Idle => self.restart_scan(),
            _ => {
                debug!("central: start ignored, link busy");
                Ok(())
            }
        }
    }

    /// Inspect one advertising report; connect to the first peer that
    /// advertises the UART service.
    ///
    /// The report is parsed in full before the scan is stopped, so a failed
    /// stop drops the whole report. The central stays scanning and the
    /// peer's next report is a fresh candidate.
    pub fn on_device_observed(
        &mut self,
        address: Address,
        adv_type: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        if !matches!(self.link, Link::Scanning) {
            trace!("central: report outside scanning, ignored");
            return Ok(());
        }
        if !adv_parser::is_connectable(adv_type) {
            return Ok(());
        }
        if !adv_parser::contains_service_uuid(data, self.config.service_uuid) {
            return Ok(());
        }

        let name = adv_parser::extract_device_name(data);
        info!(
            "central: found {:?} ({}), connecting",
            address,
            name.as_str()
        );

        if let Err(e) = self.transport.stop_scan() {
            warn!("central: stop scan failed (err {}), skipping peer", e.code());
            return Err(Error::ScanFailure(e));
        }

        match self.transport.connect(&address) {
            Ok(()) => {
                self.link = Link::Connecting(address);
                Ok(())
            }
            Err(e) => {
                warn!("central: connect request failed (err {})", e.code());
                // Scan failure is logged by restart_scan; the connect error
                // is what the caller cares about.
                let _ = self.restart_scan();
                Err(ConnectFailure::Issue(e).into())
            }
        }
    }

    pub fn on_connected(&mut self, conn: ConnHandle, status: ConnectStatus) -> Result<(), Error> {
        if !matches!(self.link, Link::Connecting(_)) {
            warn!("central: unexpected connect event (conn {})", conn.0);
            return Err(Error::StaleEvent);
        }

        if let ConnectStatus::Failed(code) = status {
            warn!("central: connection failed (status {:#x})", code);
            self.transport.release(conn);
            let _ = self.restart_scan();
            return Err(ConnectFailure::Status(code).into());
        }

        info!("central: connected (conn {})", conn.0);
        self.link = Link::Connected(Session::new(conn, self.config));
        self.issue_discovery()
    }

    pub fn on_disconnected(
        &mut self,
        conn: ConnHandle,
        reason: DisconnectReason,
    ) -> Result<(), Error> {
        match &self.link {
            Link::Connected(session) if session.conn != conn => {
                debug!("central: disconnect for unknown conn {}", conn.0);
                return Err(Error::StaleEvent);
            }
            Link::Scanning => {
                debug!("central: already scanning");
                return Ok(());
            }
            _ => {}
        }

        info!("central: disconnected (reason {:#x})", reason.0);
        self.gateway.retract();
        self.link = Link::Idle;
        self.restart_scan()
    }

    /// Feed the single response to the outstanding discovery request.
    pub fn on_discovery_response(
        &mut self,
        conn: ConnHandle,
        found: Option<Attribute>,
    ) -> Result<(), Error> {
        let session = self.session_mut(conn)?;
        let phase = session.discovery.phase();
        let step = session.discovery.on_response(found);

        if phase == Phase::FindWriteChar {
            if let Some(handle) = session.discovery.write_value_handle() {
                self.gateway.publish(conn, handle);
            }
        }

        match step {
            Step::Query(_) => {
                debug!("discovery: {:?} matched", phase);
                self.issue_discovery()
            }
            Step::Complete(handles) => {
                info!("discovery: complete");
                let result = SubscriptionState::activate(&self.transport, conn, &handles);
                let session = self.session_mut(conn)?;
                match result {
                    Ok(subscription) => {
                        session.subscription = Some(subscription);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Step::Abort(phase) => {
                warn!("discovery: nothing found in {:?}, giving up", phase);
                self.gateway.retract();
                Err(Error::DiscoveryNotFound(phase))
            }
            Step::Stale => {
                debug!("discovery: response after session ended");
                Err(Error::StaleEvent)
            }
        }
    }

    /// Completion of the subscribe request issued when discovery finished.
    pub fn on_subscribe_complete(
        &mut self,
        conn: ConnHandle,
        result: Result<(), TransportError>,
    ) -> Result<(), Error> {
        let session = self.session_mut(conn)?;
        match session.subscription.as_mut() {
            Some(subscription) => subscription.complete(result),
            None => {
                debug!("central: subscribe completion without request");
                Err(Error::StaleEvent)
            }
        }
    }

    /// Abandon the in-flight discovery round trip of `conn`.
    ///
    /// The core arms no timers; adapters call this when their own
    /// per-request deadline expires.
    pub fn on_discovery_timeout(&mut self, conn: ConnHandle) -> Result<(), Error> {
        let session = self.session_mut(conn)?;
        if session.discovery.phase().is_terminal() {
            return Err(Error::StaleEvent);
        }
        let phase = session.discovery.abort();
        warn!("discovery: timed out in {:?}", phase);
        self.gateway.retract();
        Err(Error::DiscoveryTimeout(phase))
    }

    pub fn on_notification(
        &mut self,
        conn: ConnHandle,
        value_handle: u16,
        payload: &[u8],
    ) -> Result<Delivery, Error> {
        let Link::Connected(session) = &mut self.link else {
            return Err(Error::StaleEvent);
        };
        if session.conn != conn {
            return Err(Error::StaleEvent);
        }
        match session.subscription.as_mut() {
            Some(subscription) => Ok(subscription.on_notification(&mut self.sink, value_handle, payload)),
            None => {
                debug!("central: notification without subscription");
                Ok(Delivery::Dropped)
            }
        }
    }

    /// Forward `data` to the peripheral's write characteristic.
    pub fn write(&self, data: &[u8]) -> Result<(), Error> {
        self.gateway.write(&self.transport, data)
    }

    fn session_mut(&mut self, conn: ConnHandle) -> Result<&mut Session, Error> {
        match &mut self.link {
            Link::Connected(session) if session.conn == conn => Ok(session),
            _ => {
                debug!("central: event for stale conn {}", conn.0);
                Err(Error::StaleEvent)
            }
        }
    }

    fn issue_discovery(&mut self) -> Result<(), Error> {
        let Link::Connected(session) = &mut self.link else {
            return Err(Error::StaleEvent);
        };
        let Some(request) = session.discovery.request() else {
            return Err(Error::StaleEvent);
        };

        trace!(
            "discovery: {:?} uuid {:#x} from {:#x}",
            request.kind,
            request.uuid,
            request.range.start
        );
        if let Err(e) = self.transport.discover(session.conn, &request) {
            let phase = session.discovery.abort();
            warn!("discovery: request failed in {:?} (err {})", phase, e.code());
            self.gateway.retract();
            return Err(Error::DiscoveryIssue(e));
        }
        Ok(())
    }

    fn restart_scan(&mut self) -> Result<(), Error> {
        match self.transport.start_scan(&self.scan_params) {
            Ok(()) => {
                info!("central: scanning");
                self.link = Link::Scanning;
                Ok(())
            }
            Err(e) => {
                error!("central: scan start failed (err {})", e.code());
                self.link = Link::Idle;
                Err(Error::ScanFailure(e))
            }
        }
    }
}
