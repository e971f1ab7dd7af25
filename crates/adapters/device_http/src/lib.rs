//! # homelink-adapter-device-http
//!
//! Direct transport — talks to the on-premises microcontroller over HTTP.
//!
//! ## Device surface
//!
//! | Method | Path        | Purpose               |
//! |--------|-------------|-----------------------|
//! | GET    | `/status`   | Monitoring readings   |
//! | GET    | `/lightOn`  | Turn the light on     |
//! | GET    | `/lightOff` | Turn the light off    |
//! | GET    | `/fanOn`    | Turn the fan on       |
//! | GET    | `/fanOff`   | Turn the fan off      |
//!
//! The device has no read endpoint for the control and status sections.
//! Monitoring is polled at a fixed cadence; the status subscription stays
//! silent. For control, the transport keeps a mirror of the last state it
//! transmitted: a write issues commands only for the outputs that actually
//! changed (so toggling the fan never re-sends a stale light command), and a
//! successful write is echoed into the control subscription so the store
//! learns the new state despite the missing read surface. Pump and mode have
//! no endpoint and ride along in the mirror untransmitted.
//!
//! Every request carries a hard timeout — timeouts surface as transport
//! errors, never as store errors.
//!
//! ## Dependency rule
//!
//! Depends on `homelink-app` (port traits) and `homelink-domain` only.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use homelink_app::ports::{InboundEvent, Subscription, Transport};
use homelink_domain::control::{ControlState, Switch};
use homelink_domain::error::{HomeLinkError, TransportError};
use homelink_domain::section::{Section, SectionValue};
use homelink_domain::time::now;

/// Capacity of the channel between the poll loop and the pump.
const EVENT_CAPACITY: usize = 16;

/// Mirror of the control section on a device that cannot be asked for it.
///
/// `last_sent` is the state the transport believes the device is in, updated
/// as commands succeed. `echo` is the live control subscription (if any),
/// which receives the mirror after each write so the store stays in step.
#[derive(Debug, Default)]
struct ControlLink {
    last_sent: Mutex<ControlState>,
    echo: Mutex<Option<mpsc::Sender<InboundEvent>>>,
}

impl ControlLink {
    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> ControlState {
        *Self::lock(&self.last_sent)
    }

    fn attach(&self, sender: mpsc::Sender<InboundEvent>) {
        *Self::lock(&self.echo) = Some(sender);
    }

    /// Persist `state` and echo it into the control subscription.
    async fn commit(&self, state: ControlState) {
        *Self::lock(&self.last_sent) = state;
        let sender = Self::lock(&self.echo).clone();
        if let Some(sender) = sender {
            let event = InboundEvent::Update {
                payload: SectionValue::Control(state).encode(),
                received_at: now(),
            };
            // Subscriber gone: nothing to keep in step.
            let _ = sender.send(event).await;
        }
    }
}

/// Direct HTTP transport for a single device host.
#[derive(Clone)]
pub struct DeviceHttpTransport {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    request_timeout: Duration,
    control: Arc<ControlLink>,
}

impl DeviceHttpTransport {
    /// Create a transport for `host` (IPv4 address or hostname, no scheme).
    ///
    /// # Errors
    ///
    /// Returns a transport error when the HTTP client cannot be built.
    pub fn new(
        host: &str,
        poll_interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self, HomeLinkError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| TransportError::new(err.to_string()))?;
        Ok(Self {
            client,
            base_url: format!("http://{host}"),
            poll_interval,
            request_timeout,
            control: Arc::new(ControlLink::default()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get_ok(&self, path: &str) -> Result<reqwest::Response, HomeLinkError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| self.to_transport_error(&err))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(TransportError::bad_status(response.status().as_u16()).into())
        }
    }

    fn to_transport_error(&self, err: &reqwest::Error) -> HomeLinkError {
        if err.is_timeout() {
            TransportError::timed_out(self.request_timeout).into()
        } else {
            TransportError::new(err.to_string()).into()
        }
    }

    async fn fetch_status(&self) -> Result<Option<serde_json::Value>, HomeLinkError> {
        let response = self.get_ok("status").await?;
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|err| TransportError::new(err.to_string()))?;
        // An empty body is "absent", not a valid state.
        Ok((!payload.is_null()).then_some(payload))
    }

    /// Poll `/status` until the subscriber goes away.
    async fn poll_monitoring(self, events: mpsc::Sender<InboundEvent>) {
        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let event = match self.fetch_status().await {
                Ok(Some(payload)) => InboundEvent::Update {
                    payload,
                    received_at: now(),
                },
                Ok(None) => continue,
                Err(err) => InboundEvent::Error {
                    reason: err.to_string(),
                },
            };
            if events.send(event).await.is_err() {
                // Subscription dropped.
                break;
            }
        }
    }
}

/// The command path for one switchable output position.
fn light_path(position: Switch) -> &'static str {
    if position.is_on() { "lightOn" } else { "lightOff" }
}

fn fan_path(position: Switch) -> &'static str {
    if position.is_on() { "fanOn" } else { "fanOff" }
}

impl Transport for DeviceHttpTransport {
    fn subscribe(&self, section: Section) -> Subscription {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        match section {
            Section::Monitoring => {
                tokio::spawn(self.clone().poll_monitoring(tx));
            }
            Section::Control => {
                // Fed by write echoes; the device itself never reports.
                self.control.attach(tx);
            }
            Section::Status => {
                // No read surface on the device; hold the channel open so
                // the subscription stays registered without delivering.
                tokio::spawn(async move { tx.closed().await });
            }
        }
        Subscription::new(rx)
    }

    fn write(
        &self,
        section: Section,
        value: SectionValue,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        async move {
            let SectionValue::Control(control) = value else {
                return Err(TransportError::new(format!(
                    "section {section} is not writable on the device transport"
                ))
                .into());
            };
            debug_assert_eq!(section, Section::Control);

            // Only command the outputs that actually change relative to the
            // mirror. A caller composing from a stale snapshot must not
            // re-send old positions (a fan toggle switching the light off).
            let previous = self.control.snapshot();
            let mut applied = previous;

            if previous.light != control.light {
                self.get_ok(light_path(control.light)).await?;
                applied.light = control.light;
            }
            if previous.fan != control.fan {
                if let Err(err) = self.get_ok(fan_path(control.fan)).await {
                    // The light command already went through; keep the
                    // mirror and the store honest about it.
                    self.control.commit(applied).await;
                    return Err(err);
                }
                applied.fan = control.fan;
            }
            applied.pump = control.pump;
            applied.mode = control.mode;
            self.control.commit(applied).await;

            tracing::debug!(light = %applied.light, fan = %applied.fan, "device commands sent");
            Ok(())
        }
    }

    fn ping(&self) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        async move {
            self.get_ok("status").await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homelink_app::gateway::CommandGateway;
    use homelink_app::store::StateStore;
    use homelink_domain::control::{Mode, Switch};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POLL: Duration = Duration::from_millis(50);
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn control(light: Switch, fan: Switch) -> ControlState {
        ControlState {
            light,
            fan,
            pump: Switch::Off,
            mode: Mode::Manual,
        }
    }

    fn transport_against(server: &MockServer) -> DeviceHttpTransport {
        let host = server
            .uri()
            .strip_prefix("http://")
            .expect("mock server uri is plain http")
            .to_string();
        DeviceHttpTransport::new(&host, POLL, TIMEOUT).unwrap()
    }

    #[test]
    fn should_map_switch_positions_to_command_paths() {
        assert_eq!(light_path(Switch::On), "lightOn");
        assert_eq!(light_path(Switch::Off), "lightOff");
        assert_eq!(fan_path(Switch::On), "fanOn");
        assert_eq!(fan_path(Switch::Off), "fanOff");
    }

    #[tokio::test]
    async fn should_poll_status_and_deliver_updates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "voltage": 230.0, "current": 1.5, "power": 345.0, "energy": 2.5
            })))
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        let mut sub = transport.subscribe(Section::Monitoring);
        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("poll should deliver within two seconds")
            .expect("subscription should stay open");

        let InboundEvent::Update { payload, .. } = event else {
            panic!("expected an update");
        };
        assert_eq!(payload["current"], serde_json::json!(1.5));
    }

    #[tokio::test]
    async fn should_deliver_error_event_when_poll_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        let mut sub = transport.subscribe(Section::Monitoring);
        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();

        let InboundEvent::Error { reason } = event else {
            panic!("expected an error event");
        };
        assert!(reason.contains("500"));
    }

    #[tokio::test]
    async fn should_skip_null_status_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::Value::Null),
            )
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        let mut sub = transport.subscribe(Section::Monitoring);
        let outcome = tokio::time::timeout(Duration::from_millis(300), sub.recv()).await;
        assert!(outcome.is_err(), "absent readings must not become events");
    }

    #[tokio::test]
    async fn should_issue_light_and_fan_commands_on_control_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lightOn"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fanOn"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        transport
            .write(
                Section::Control,
                SectionValue::Control(control(Switch::On, Switch::On)),
            )
            .await
            .unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn should_only_command_outputs_that_changed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lightOn"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        // The fan is already off in the mirror; no command for it.
        Mock::given(method("GET"))
            .and(path("/fanOff"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        transport
            .write(
                Section::Control,
                SectionValue::Control(control(Switch::On, Switch::Off)),
            )
            .await
            .unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn should_not_resend_stale_light_command_on_fan_toggle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lightOn"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fanOn"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lightOff"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        transport
            .write(
                Section::Control,
                SectionValue::Control(control(Switch::On, Switch::Off)),
            )
            .await
            .unwrap();
        transport
            .write(
                Section::Control,
                SectionValue::Control(control(Switch::On, Switch::On)),
            )
            .await
            .unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn should_echo_control_state_after_successful_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lightOn"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let transport = transport_against(&server);
        let mut echoes = transport.subscribe(Section::Control);

        let next = control(Switch::On, Switch::Off);
        transport
            .write(Section::Control, SectionValue::Control(next))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), echoes.recv())
            .await
            .unwrap()
            .unwrap();
        let InboundEvent::Update { payload, .. } = event else {
            panic!("expected a control echo");
        };
        assert_eq!(payload, SectionValue::Control(next).encode());
    }

    #[tokio::test]
    async fn should_not_switch_light_off_when_toggling_fan_through_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lightOn"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fanOn"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lightOff"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fanOff"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        let store = Arc::new(StateStore::new());
        store.mark_connected();
        let gateway = CommandGateway::new(Arc::clone(&store), transport.clone(), TIMEOUT);
        let mut echoes = transport.subscribe(Section::Control);

        gateway.set_light(Switch::On).await.unwrap();
        let InboundEvent::Update {
            payload,
            received_at,
        } = echoes.recv().await.unwrap()
        else {
            panic!("expected a control echo");
        };
        store.apply(Section::Control, &payload, received_at).unwrap();

        gateway.set_fan(Switch::On).await.unwrap();

        server.verify().await;
        assert_eq!(store.control().unwrap().light, Switch::On);
    }

    #[tokio::test]
    async fn should_fail_write_when_device_rejects_command() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lightOn"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let transport = transport_against(&server);

        let result = transport
            .write(
                Section::Control,
                SectionValue::Control(control(Switch::On, Switch::Off)),
            )
            .await;
        assert!(matches!(result, Err(HomeLinkError::Transport(_))));
    }

    #[tokio::test]
    async fn should_reject_write_to_unreadable_section() {
        let transport = DeviceHttpTransport::new("127.0.0.1:9", POLL, TIMEOUT).unwrap();
        let result = transport
            .write(
                Section::Status,
                SectionValue::Status(homelink_domain::status::StatusState::default()),
            )
            .await;
        assert!(matches!(result, Err(HomeLinkError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_control_subscription_silent_without_writes() {
        let transport = DeviceHttpTransport::new("127.0.0.1:9", POLL, TIMEOUT).unwrap();
        let mut sub = transport.subscribe(Section::Control);
        let outcome = tokio::time::timeout(Duration::from_secs(30), sub.recv()).await;
        assert!(outcome.is_err(), "control subscription must not deliver");
    }

    #[tokio::test]
    async fn should_answer_ping_via_status_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        let transport = transport_against(&server);
        transport.ping().await.unwrap();
    }

    #[tokio::test]
    async fn should_surface_connection_failure_as_transport_error() {
        // Port 9 (discard) is reliably closed on loopback.
        let transport = DeviceHttpTransport::new("127.0.0.1:9", POLL, TIMEOUT).unwrap();
        let result = transport.ping().await;
        assert!(matches!(result, Err(HomeLinkError::Transport(_))));
    }
}
