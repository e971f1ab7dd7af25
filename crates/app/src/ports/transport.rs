//! Transport port — uniform read/write access to the device state, whatever
//! the back-end.
//!
//! Two adapters implement this trait: the direct HTTP transport (polling an
//! on-premises microcontroller) and the cloud transport (subscribing to a
//! hierarchical realtime KV store). The store and gateway only ever see this
//! contract; neither back-end leaks through it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use homelink_domain::error::HomeLinkError;
use homelink_domain::section::{Section, SectionValue};
use homelink_domain::time::Timestamp;

/// One delivery from a section subscription.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A complete section payload, raw off the wire. Decoding and invariant
    /// checks happen in the store so that every schema failure is handled in
    /// one place.
    Update {
        payload: serde_json::Value,
        received_at: Timestamp,
    },
    /// The subscription observed a transport failure (poll error, dropped
    /// stream). The subscription itself stays alive and keeps retrying.
    Error { reason: String },
}

/// Handle to an active section subscription.
///
/// Dropping the subscription cancels it: the producing task notices the
/// closed channel on its next send and stops within one event-loop turn.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<InboundEvent>,
}

impl Subscription {
    /// Wrap a channel receiver produced by an adapter.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<InboundEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event, or `None` once the adapter side has shut down.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.receiver.recv().await
    }
}

/// Uniform contract over the two back-ends.
///
/// Writes carry a **complete** section payload — the server replaces the
/// subtree, it never merges. If two writes to the same section race, the last
/// to reach the server wins; the store reconciles on the next inbound event.
pub trait Transport: Send + Sync {
    /// Start observing a section. Events arrive in the order the transport
    /// observes them; no cross-section ordering is promised.
    fn subscribe(&self, section: Section) -> Subscription;

    /// Replace the section subtree with `value`.
    fn write(
        &self,
        section: Section,
        value: SectionValue,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send;

    /// Cheap reachability probe used by the liveness monitor.
    fn ping(&self) -> impl Future<Output = Result<(), HomeLinkError>> + Send;

    /// Whether the back-end re-establishes dropped subscriptions on its own.
    /// When true the liveness monitor skips its ping loop while offline.
    fn auto_reconnects(&self) -> bool {
        false
    }

    /// Whether the back-end buffers writes issued while the link is down.
    /// When true the gateway skips its `not_connected` pre-check.
    fn queues_when_offline(&self) -> bool {
        false
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn subscribe(&self, section: Section) -> Subscription {
        (**self).subscribe(section)
    }

    fn write(
        &self,
        section: Section,
        value: SectionValue,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        (**self).write(section, value)
    }

    fn ping(&self) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        (**self).ping()
    }

    fn auto_reconnects(&self) -> bool {
        (**self).auto_reconnects()
    }

    fn queues_when_offline(&self) -> bool {
        (**self).queues_when_offline()
    }
}
