//! View contract — read-only selectors plus command handles consumed by the
//! screens.
//!
//! Screens receive a [`ViewHandle`] by construction and never touch the
//! transport or the store directly. The subscription primitive re-delivers a
//! [`StoreEvent`] on every assignment so screens can re-render on change.

use std::sync::Arc;

use tokio::sync::broadcast;

use homelink_domain::control::{ControlState, Mode, Switch};
use homelink_domain::error::HomeLinkError;
use homelink_domain::monitoring::MonitoringState;
use homelink_domain::status::StatusState;
use homelink_domain::time::Timestamp;

use crate::gateway::CommandGateway;
use crate::ports::Transport;
use crate::store::{StateStore, StoreEvent};

/// Read + write surface of the core, handed to the view layer.
pub struct ViewHandle<T> {
    store: Arc<StateStore>,
    gateway: Arc<CommandGateway<T>>,
    current_threshold: f64,
}

impl<T> Clone for ViewHandle<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
            current_threshold: self.current_threshold,
        }
    }
}

impl<T: Transport> ViewHandle<T> {
    /// Create a handle over the given store and gateway.
    /// `current_threshold` is the ampere level for [`high_current`](Self::high_current).
    pub fn new(
        store: Arc<StateStore>,
        gateway: Arc<CommandGateway<T>>,
        current_threshold: f64,
    ) -> Self {
        Self {
            store,
            gateway,
            current_threshold,
        }
    }

    /// Subscribe to change notifications for re-rendering.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Control section snapshot, if ever received.
    #[must_use]
    pub fn control_data(&self) -> Option<ControlState> {
        self.store.control()
    }

    /// Monitoring section snapshot, if ever received.
    #[must_use]
    pub fn monitoring_data(&self) -> Option<MonitoringState> {
        self.store.monitoring()
    }

    /// Status section snapshot, if ever received.
    #[must_use]
    pub fn status_data(&self) -> Option<StatusState> {
        self.store.status()
    }

    /// Whether the link has seen recent, successful traffic.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.store.link().connected
    }

    /// Whether the first event is still awaited.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.store.link().loading
    }

    /// When any section was last successfully refreshed.
    #[must_use]
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.store.link().last_updated
    }

    /// Last failure observed on the link, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.store.link().last_error
    }

    /// Fire detected by the device.
    #[must_use]
    pub fn fire_alert(&self) -> bool {
        self.status_data().is_some_and(|status| status.fire)
    }

    /// Current draw strictly above the configured ampere threshold.
    #[must_use]
    pub fn high_current(&self) -> bool {
        self.monitoring_data()
            .is_some_and(|monitoring| monitoring.high_current(self.current_threshold))
    }

    /// Water tank needs refilling.
    #[must_use]
    pub fn water_low(&self) -> bool {
        self.status_data()
            .is_some_and(|status| status.water_level.is_low())
    }

    /// Switch the light. See [`CommandGateway::set_light`].
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error contract.
    pub async fn set_light(&self, position: Switch) -> Result<(), HomeLinkError> {
        self.gateway.set_light(position).await
    }

    /// Switch the fan. See [`CommandGateway::set_fan`].
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error contract.
    pub async fn set_fan(&self, position: Switch) -> Result<(), HomeLinkError> {
        self.gateway.set_fan(position).await
    }

    /// Switch the water pump. See [`CommandGateway::set_pump`].
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error contract.
    pub async fn set_pump(&self, position: Switch) -> Result<(), HomeLinkError> {
        self.gateway.set_pump(position).await
    }

    /// Change the operation mode. See [`CommandGateway::set_mode`].
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error contract.
    pub async fn set_mode(&self, mode: Mode) -> Result<(), HomeLinkError> {
        self.gateway.set_mode(mode).await
    }

    /// Set or clear the fire flag. See [`CommandGateway::set_fire`].
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error contract.
    pub async fn set_fire(&self, fire: bool) -> Result<(), HomeLinkError> {
        self.gateway.set_fire(fire).await
    }
}
