//! Command gateway — accepts user intents, validates them against the mode,
//! dispatches to the transport, and reports the outcome.
//!
//! The gateway never mutates the store on success. The device is
//! authoritative: the effect of a command becomes visible when its echo comes
//! back as a regular inbound event. Optimistic writes combined with 1 Hz
//! polling produce visible flicker when a command fails silently.

use std::time::Duration;

use homelink_domain::control::{Mode, Switch};
use homelink_domain::error::{HomeLinkError, TransportError};
use homelink_domain::section::SectionValue;

use crate::ports::Transport;
use crate::store::StateStore;

/// The manually switchable outputs of the control section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Light,
    Fan,
    Pump,
}

/// Validates and dispatches user commands.
///
/// Holds a read-only view of the store (for snapshot composition and the
/// mode-lock check) plus the transport to write through.
pub struct CommandGateway<T> {
    store: std::sync::Arc<StateStore>,
    transport: T,
    write_timeout: Duration,
}

impl<T: Transport> CommandGateway<T> {
    /// Create a gateway writing through `transport` with the given hard
    /// per-write deadline.
    pub fn new(store: std::sync::Arc<StateStore>, transport: T, write_timeout: Duration) -> Self {
        Self {
            store,
            transport,
            write_timeout,
        }
    }

    /// Switch the light.
    ///
    /// # Errors
    ///
    /// [`HomeLinkError::ModeLocked`] while the device runs in AUTO mode,
    /// [`HomeLinkError::NotConnected`] when the link is down on a
    /// non-buffering transport, or [`HomeLinkError::Transport`] when the
    /// write fails or times out.
    pub async fn set_light(&self, position: Switch) -> Result<(), HomeLinkError> {
        self.set_output(Output::Light, position).await
    }

    /// Switch the fan.
    ///
    /// # Errors
    ///
    /// Same contract as [`set_light`](Self::set_light).
    pub async fn set_fan(&self, position: Switch) -> Result<(), HomeLinkError> {
        self.set_output(Output::Fan, position).await
    }

    /// Switch the water pump.
    ///
    /// # Errors
    ///
    /// Same contract as [`set_light`](Self::set_light).
    pub async fn set_pump(&self, position: Switch) -> Result<(), HomeLinkError> {
        self.set_output(Output::Pump, position).await
    }

    /// Change the operation mode. Never mode-locked — this is the escape
    /// hatch out of AUTO.
    ///
    /// # Errors
    ///
    /// [`HomeLinkError::NotConnected`] or [`HomeLinkError::Transport`].
    pub async fn set_mode(&self, mode: Mode) -> Result<(), HomeLinkError> {
        self.ensure_connected()?;
        let mut next = self.store.control().unwrap_or_default();
        next.mode = mode;
        self.dispatch(SectionValue::Control(next)).await
    }

    /// Set or clear the fire flag on the status section.
    ///
    /// # Errors
    ///
    /// [`HomeLinkError::NotConnected`] or [`HomeLinkError::Transport`].
    pub async fn set_fire(&self, fire: bool) -> Result<(), HomeLinkError> {
        self.ensure_connected()?;
        let mut next = self.store.status().unwrap_or_default();
        next.fire = fire;
        self.dispatch(SectionValue::Status(next)).await
    }

    async fn set_output(&self, output: Output, position: Switch) -> Result<(), HomeLinkError> {
        // Mode lock comes first: an AUTO rejection must not touch the
        // network, whatever the link looks like.
        let snapshot = self.store.control().unwrap_or_default();
        if snapshot.mode.locks_manual_control() {
            return Err(HomeLinkError::ModeLocked);
        }
        self.ensure_connected()?;

        // Compose the complete payload from the current snapshot — the
        // server replaces the section, it does not merge.
        let mut next = snapshot;
        match output {
            Output::Light => next.light = position,
            Output::Fan => next.fan = position,
            Output::Pump => next.pump = position,
        }
        self.dispatch(SectionValue::Control(next)).await
    }

    fn ensure_connected(&self) -> Result<(), HomeLinkError> {
        if self.transport.queues_when_offline() || self.store.link().connected {
            Ok(())
        } else {
            Err(HomeLinkError::NotConnected)
        }
    }

    async fn dispatch(&self, value: SectionValue) -> Result<(), HomeLinkError> {
        let section = value.section();
        let outcome = match tokio::time::timeout(
            self.write_timeout,
            self.transport.write(section, value),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(TransportError::timed_out(self.write_timeout).into()),
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(%section, "command dispatched");
                Ok(())
            }
            Err(err) => {
                // A single failed write does not imply the link is down;
                // only the error slot is touched.
                tracing::warn!(%section, %err, "command dispatch failed");
                self.store.record_error(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    use homelink_domain::control::ControlState;
    use homelink_domain::section::Section;
    use homelink_domain::time::now;

    use crate::ports::Subscription;

    /// Records writes; behaviour per call is scripted up-front.
    struct FakeTransport {
        writes: Mutex<Vec<(Section, serde_json::Value)>>,
        fail_writes: bool,
        hang_writes: bool,
        queues_offline: bool,
    }

    impl Default for FakeTransport {
        fn default() -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_writes: false,
                hang_writes: false,
                queues_offline: false,
            }
        }
    }

    impl FakeTransport {
        fn recorded(&self) -> Vec<(Section, serde_json::Value)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl Transport for FakeTransport {
        fn subscribe(&self, _section: Section) -> Subscription {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Subscription::new(rx)
        }

        fn write(
            &self,
            section: Section,
            value: SectionValue,
        ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
            if !self.hang_writes {
                self.writes.lock().unwrap().push((section, value.encode()));
            }
            let fail = self.fail_writes;
            let hang = self.hang_writes;
            async move {
                if hang {
                    std::future::pending::<()>().await;
                }
                if fail {
                    Err(TransportError::new("device unreachable").into())
                } else {
                    Ok(())
                }
            }
        }

        fn ping(&self) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
            async { Ok(()) }
        }

        fn queues_when_offline(&self) -> bool {
            self.queues_offline
        }
    }

    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    fn connected_store_with_control(payload: serde_json::Value) -> Arc<StateStore> {
        let store = Arc::new(StateStore::new());
        store.apply(Section::Control, &payload, now()).unwrap();
        store.mark_connected();
        store
    }

    fn gateway(
        store: &Arc<StateStore>,
        transport: &Arc<FakeTransport>,
    ) -> CommandGateway<Arc<FakeTransport>> {
        CommandGateway::new(Arc::clone(store), Arc::clone(transport), WRITE_TIMEOUT)
    }

    #[tokio::test]
    async fn should_reject_output_command_in_auto_mode() {
        let store = connected_store_with_control(serde_json::json!({
            "light": "OFF", "fan": "OFF", "pump": "OFF", "mode": "AUTO"
        }));
        let transport = Arc::new(FakeTransport::default());
        let gateway = gateway(&store, &transport);

        let result = gateway.set_light(Switch::On).await;
        assert!(matches!(result, Err(HomeLinkError::ModeLocked)));
        assert!(transport.recorded().is_empty());
        assert_eq!(store.control().unwrap(), ControlState::default());
    }

    #[tokio::test]
    async fn should_compose_full_payload_from_snapshot() {
        let store = connected_store_with_control(serde_json::json!({
            "light": "OFF", "fan": "OFF", "pump": "OFF", "mode": "MANUAL"
        }));
        let transport = Arc::new(FakeTransport::default());
        let gateway = gateway(&store, &transport);

        gateway.set_fan(Switch::On).await.unwrap();

        let writes = transport.recorded();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, Section::Control);
        assert_eq!(
            writes[0].1,
            serde_json::json!({
                "light": "OFF", "fan": "ON", "pump": "OFF", "mode": "MANUAL"
            })
        );
        // Authoritative-only: the store keeps the pre-command snapshot.
        assert_eq!(store.control().unwrap().fan, Switch::Off);
    }

    #[tokio::test]
    async fn should_allow_mode_change_while_in_auto() {
        let store = connected_store_with_control(serde_json::json!({
            "light": "ON", "fan": "OFF", "pump": "OFF", "mode": "AUTO"
        }));
        let transport = Arc::new(FakeTransport::default());
        let gateway = gateway(&store, &transport);

        gateway.set_mode(Mode::Manual).await.unwrap();

        let writes = transport.recorded();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0].1,
            serde_json::json!({
                "light": "ON", "fan": "OFF", "pump": "OFF", "mode": "MANUAL"
            })
        );
    }

    #[tokio::test]
    async fn should_reject_command_while_disconnected() {
        let store = Arc::new(StateStore::new());
        store
            .apply(
                Section::Control,
                &serde_json::json!({
                    "light": "OFF", "fan": "OFF", "pump": "OFF", "mode": "MANUAL"
                }),
                now(),
            )
            .unwrap();
        // never marked connected
        let transport = Arc::new(FakeTransport::default());
        let gateway = gateway(&store, &transport);

        let result = gateway.set_pump(Switch::On).await;
        assert!(matches!(result, Err(HomeLinkError::NotConnected)));
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn should_skip_connectivity_check_for_buffering_transport() {
        let store = Arc::new(StateStore::new());
        let transport = Arc::new(FakeTransport {
            queues_offline: true,
            ..FakeTransport::default()
        });
        let gateway = gateway(&store, &transport);

        // No control snapshot yet: composition falls back to the default.
        gateway.set_light(Switch::On).await.unwrap();
        assert_eq!(
            transport.recorded()[0].1,
            serde_json::json!({
                "light": "ON", "fan": "OFF", "pump": "OFF", "mode": "MANUAL"
            })
        );
    }

    #[tokio::test]
    async fn should_record_error_and_keep_link_on_failed_write() {
        let store = connected_store_with_control(serde_json::json!({
            "light": "OFF", "fan": "OFF", "pump": "OFF", "mode": "MANUAL"
        }));
        let transport = Arc::new(FakeTransport {
            fail_writes: true,
            ..FakeTransport::default()
        });
        let gateway = gateway(&store, &transport);

        let result = gateway.set_light(Switch::On).await;
        assert!(matches!(result, Err(HomeLinkError::Transport(_))));

        let link = store.link();
        assert!(link.last_error.unwrap().starts_with("transport:"));
        assert!(link.connected);
        assert_eq!(store.control().unwrap().light, Switch::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn should_abort_write_at_the_timeout() {
        let store = connected_store_with_control(serde_json::json!({
            "light": "OFF", "fan": "OFF", "pump": "OFF", "mode": "MANUAL"
        }));
        let transport = Arc::new(FakeTransport {
            hang_writes: true,
            ..FakeTransport::default()
        });
        let gateway = gateway(&store, &transport);

        let started = tokio::time::Instant::now();
        let result = gateway.set_light(Switch::On).await;
        assert_eq!(started.elapsed(), WRITE_TIMEOUT);

        assert!(matches!(result, Err(HomeLinkError::Transport(_))));
        assert!(store.link().last_error.unwrap().contains("timed out"));
        assert!(store.link().connected);
    }

    #[tokio::test]
    async fn should_write_status_section_for_fire_command() {
        let store = Arc::new(StateStore::new());
        store
            .apply(
                Section::Status,
                &serde_json::json!({ "fire": false, "waterLevel": "LOW" }),
                now(),
            )
            .unwrap();
        store.mark_connected();
        let transport = Arc::new(FakeTransport::default());
        let gateway = gateway(&store, &transport);

        gateway.set_fire(true).await.unwrap();

        let writes = transport.recorded();
        assert_eq!(writes[0].0, Section::Status);
        assert_eq!(
            writes[0].1,
            serde_json::json!({ "fire": true, "waterLevel": "LOW" })
        );
    }

    #[tokio::test]
    async fn should_issue_one_write_per_repeated_command() {
        let store = connected_store_with_control(serde_json::json!({
            "light": "ON", "fan": "OFF", "pump": "OFF", "mode": "MANUAL"
        }));
        let transport = Arc::new(FakeTransport::default());
        let gateway = gateway(&store, &transport);

        // No deduplication: commanding the current position still writes.
        gateway.set_light(Switch::On).await.unwrap();
        gateway.set_light(Switch::On).await.unwrap();
        assert_eq!(transport.recorded().len(), 2);
    }
}
