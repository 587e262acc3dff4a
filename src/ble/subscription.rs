//! Notification subscription on the notify characteristic.
//!
//! Activated once per connection when discovery reaches `Done`. The state
//! starts out pending and goes live when the transport confirms the CCC
//! write. An empty notification is the stack's unsubscribe acknowledgment:
//! the state goes inactive and stays that way until the next connection.

use super::discovery::ResolvedHandles;
use super::transport::Transport;
use super::ConnHandle;
use crate::config::CCC_NOTIFY;
use crate::error::{Error, TransportError};

/// Consumer of notification payloads (console, display, test probe...).
pub trait NotificationSink {
    /// Called with the payload exactly as received. Bytes may contain NULs.
    fn on_notification(&mut self, value_handle: u16, payload: &[u8]);
}

impl<S: NotificationSink + ?Sized> NotificationSink for &mut S {
    fn on_notification(&mut self, value_handle: u16, payload: &[u8]) {
        (**self).on_notification(value_handle, payload)
    }
}

/// Parameters of a subscribe request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscribeParams {
    pub ccc_handle: u16,
    pub value_handle: u16,
    /// CCC value to write; notifications only.
    pub value: u16,
}

impl SubscribeParams {
    pub fn notify(handles: &ResolvedHandles) -> Self {
        Self {
            ccc_handle: handles.ccc_handle,
            value_handle: handles.notify_value_handle,
            value: CCC_NOTIFY,
        }
    }
}

/// What happened to one notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Payload handed to the sink.
    Forwarded,
    /// Empty payload: subscription cleared.
    Unsubscribed,
    /// Subscription inactive or handle mismatch; payload dropped.
    Dropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Subscribe issued, CCC write not confirmed yet.
    Pending,
    Active,
    /// Unsubscribed by the peer; never resubscribed on this connection.
    Inactive,
}

/// Subscription of the current connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriptionState {
    params: SubscribeParams,
    status: Status,
}

impl SubscriptionState {
    /// Issue the subscribe request. "Already subscribed" counts as success
    /// and skips the pending state.
    pub fn activate<T: Transport>(
        transport: &T,
        conn: ConnHandle,
        handles: &ResolvedHandles,
    ) -> Result<Self, Error> {
        let params = SubscribeParams::notify(handles);
        let status = match transport.subscribe(conn, &params) {
            Ok(()) => Status::Pending,
            Err(TransportError::ALREADY) => Status::Active,
            Err(e) => {
                warn!("subscription: subscribe failed (err {})", e.code());
                return Err(Error::SubscribeFailure(e));
            }
        };
        debug!(
            "subscription: requested (ccc {:#x}, value {:#x})",
            params.ccc_handle,
            params.value_handle
        );
        Ok(Self { params, status })
    }

    /// Apply the transport's verdict on the CCC write.
    pub fn complete(&mut self, result: Result<(), TransportError>) -> Result<(), Error> {
        if self.status != Status::Pending {
            debug!("subscription: completion without pending subscribe");
            return Err(Error::StaleEvent);
        }
        match result {
            Ok(()) | Err(TransportError::ALREADY) => {
                info!(
                    "subscription: subscribed (ccc {:#x}, value {:#x})",
                    self.params.ccc_handle,
                    self.params.value_handle
                );
                self.status = Status::Active;
                Ok(())
            }
            Err(e) => {
                warn!("subscription: CCC write failed (err {})", e.code());
                self.status = Status::Inactive;
                Err(Error::SubscribeFailure(e))
            }
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn params(&self) -> &SubscribeParams {
        &self.params
    }

    /// Route one notification.
    pub fn on_notification<S: NotificationSink>(
        &mut self,
        sink: &mut S,
        value_handle: u16,
        payload: &[u8],
    ) -> Delivery {
        if payload.is_empty() {
            info!("subscription: unsubscribed");
            self.status = Status::Inactive;
            return Delivery::Unsubscribed;
        }

        if !self.is_active() {
            debug!("subscription: not active, dropping {} bytes", payload.len());
            return Delivery::Dropped;
        }

        if value_handle != self.params.value_handle {
            debug!(
                "subscription: notification on unexpected handle {:#x}",
                value_handle
            );
            return Delivery::Dropped;
        }

        trace!("subscription: {} bytes on {:#x}", payload.len(), value_handle);
        sink.on_notification(value_handle, payload);
        Delivery::Forwarded
    }
}
