//! State store — the single mutable projection of remote device state.
//!
//! The store exclusively owns the four entities (control, monitoring, status,
//! link); every other component holds read-only snapshots plus a subscription
//! handle. Change notifications fan out over a tokio [`broadcast`] channel,
//! one event per assignment — even when the new value is structurally equal
//! (observers dedupe if they care).

use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use homelink_domain::control::ControlState;
use homelink_domain::error::HomeLinkError;
use homelink_domain::link::LinkState;
use homelink_domain::monitoring::MonitoringState;
use homelink_domain::section::{Section, SectionValue};
use homelink_domain::status::StatusState;
use homelink_domain::time::Timestamp;

/// Change notification fanned out to store observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The named section was assigned a new payload.
    Section(Section),
    /// The link projection changed (connectivity, error slot, or both).
    Link,
}

#[derive(Debug, Default)]
struct Projection {
    control: Option<ControlState>,
    monitoring: Option<MonitoringState>,
    status: Option<StatusState>,
    link: LinkState,
}

/// Authoritative local view of the remote device state.
///
/// All sections start absent (the "unknown" sentinel) and are only ever
/// assigned by inbound transport events that pass validation. Commands never
/// mutate the store directly — the device is authoritative, and the echo of
/// a successful command arrives as a regular inbound event.
pub struct StateStore {
    inner: Mutex<Projection>,
    notifier: broadcast::Sender<StoreEvent>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Channel capacity for change notifications. Observers that fall this
    /// far behind observe a `Lagged` error and resynchronise from a snapshot.
    const NOTIFY_CAPACITY: usize = 64;

    /// Create an empty store: all sections unknown, link loading.
    #[must_use]
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(Self::NOTIFY_CAPACITY);
        Self {
            inner: Mutex::new(Projection::default()),
            notifier,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Projection> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: StoreEvent) {
        // send fails only when there are zero receivers, which is fine.
        let _ = self.notifier.send(event);
    }

    /// Subscribe to change notifications.
    ///
    /// Returns a receiver that will get all events published *after* the
    /// subscription is created. Dropping the receiver cancels it.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.notifier.subscribe()
    }

    /// Snapshot of the control section, if ever received.
    #[must_use]
    pub fn control(&self) -> Option<ControlState> {
        self.lock().control
    }

    /// Snapshot of the monitoring section, if ever received.
    #[must_use]
    pub fn monitoring(&self) -> Option<MonitoringState> {
        self.lock().monitoring
    }

    /// Snapshot of the status section, if ever received.
    #[must_use]
    pub fn status(&self) -> Option<StatusState> {
        self.lock().status
    }

    /// Snapshot of the named section, if ever received.
    #[must_use]
    pub fn get(&self, section: Section) -> Option<SectionValue> {
        let projection = self.lock();
        match section {
            Section::Control => projection.control.map(SectionValue::Control),
            Section::Monitoring => projection.monitoring.map(SectionValue::Monitoring),
            Section::Status => projection.status.map(SectionValue::Status),
        }
    }

    /// Snapshot of the link projection.
    #[must_use]
    pub fn link(&self) -> LinkState {
        self.lock().link.clone()
    }

    /// Apply an inbound payload to the named section.
    ///
    /// The raw payload is decoded and validated first; a payload carrying an
    /// out-of-domain value, a wrong type, or a missing field is rejected
    /// wholesale — the prior section value and the link's `connected` flag
    /// are retained, and the schema failure lands in `last_error`.
    ///
    /// On success the section is assigned (even if structurally equal, so
    /// observers see one event per apply), `last_updated` advances
    /// monotonically, and any stale `last_error` is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Schema`] when the payload does not fit.
    pub fn apply(
        &self,
        section: Section,
        raw: &serde_json::Value,
        received_at: Timestamp,
    ) -> Result<(), HomeLinkError> {
        let value = match SectionValue::decode(section, raw) {
            Ok(value) => value,
            Err(err) => {
                let err = HomeLinkError::from(err);
                self.lock().link.record_error(err.to_string());
                self.notify(StoreEvent::Link);
                return Err(err);
            }
        };

        {
            let mut projection = self.lock();
            match value {
                SectionValue::Control(control) => projection.control = Some(control),
                SectionValue::Monitoring(monitoring) => projection.monitoring = Some(monitoring),
                SectionValue::Status(status) => projection.status = Some(status),
            }
            projection.link.refreshed(received_at);
        }
        self.notify(StoreEvent::Section(section));
        Ok(())
    }

    /// Transition the link to connected (liveness monitor only).
    pub fn mark_connected(&self) {
        self.lock().link.mark_connected();
        self.notify(StoreEvent::Link);
    }

    /// Transition the link to offline (liveness monitor only).
    pub fn mark_offline(&self) {
        self.lock().link.mark_offline();
        self.notify(StoreEvent::Link);
    }

    /// Record a failure in the link's error slot without touching
    /// connectivity. Used for failed writes and transport faults.
    pub fn record_error(&self, message: impl Into<String>) {
        self.lock().link.record_error(message);
        self.notify(StoreEvent::Link);
    }
}
