//! # homelink-adapter-cloud-kv
//!
//! Cloud transport — subscribes to a hierarchical realtime KV store rooted at
//! `smartHome/{control,monitoring,status}` and replaces whole subtrees on
//! write.
//!
//! The wire is the KV store's streaming REST protocol: a long-lived GET with
//! `Accept: text/event-stream` delivers `put`/`patch` frames for the watched
//! subtree; writes are plain `PUT`s of the full section JSON. Dropped streams
//! are re-established internally with a fixed delay, so this transport
//! reports itself as auto-reconnecting and the liveness monitor skips its
//! ping loop.
//!
//! ## Dependency rule
//!
//! Depends on `homelink-app` (port traits) and `homelink-domain` only.

mod sse;

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;

use homelink_app::ports::{InboundEvent, Subscription, Transport};
use homelink_domain::error::{HomeLinkError, TransportError};
use homelink_domain::section::{Section, SectionValue};
use homelink_domain::time::now;

use sse::{SseFrame, SseParser};

/// Capacity of the channel between the stream reader and the pump.
const EVENT_CAPACITY: usize = 16;

/// Root path of the deployment inside the KV store.
const ROOT: &str = "smartHome";

/// Cloud realtime-KV transport.
#[derive(Clone)]
pub struct CloudKvTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
    reconnect_delay: Duration,
}

impl CloudKvTransport {
    /// Create a transport for the KV store at `base_url`
    /// (e.g. `https://my-project.firebaseio.com`).
    ///
    /// The client carries no global timeout — the subscription stream is
    /// long-lived by design. Writes and pings get `request_timeout` applied
    /// per request.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
        reconnect_delay: Duration,
    ) -> Result<Self, HomeLinkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| TransportError::new(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            request_timeout,
            reconnect_delay,
        })
    }

    fn with_auth(&self, url: String) -> String {
        match &self.api_key {
            Some(key) if url.contains('?') => format!("{url}&auth={key}"),
            Some(key) => format!("{url}?auth={key}"),
            None => url,
        }
    }

    fn section_url(&self, section: Section) -> String {
        self.with_auth(format!("{}/{ROOT}/{}.json", self.base_url, section.path()))
    }

    fn root_url(&self) -> String {
        self.with_auth(format!("{}/{ROOT}.json?shallow=true", self.base_url))
    }

    async fn open_stream(&self, section: Section) -> Result<reqwest::Response, HomeLinkError> {
        let response = self
            .client
            .get(self.section_url(section))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| TransportError::new(err.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(TransportError::bad_status(response.status().as_u16()).into())
        }
    }

    /// Watch one section until the subscriber goes away, reconnecting on
    /// every stream fault.
    async fn stream_section(self, section: Section, events: mpsc::Sender<InboundEvent>) {
        loop {
            let end = match self.open_stream(section).await {
                Ok(response) => self.consume(section, response, &events).await,
                Err(err) => StreamEnd::Faulted(err.to_string()),
            };
            match end {
                StreamEnd::Cancelled => break,
                StreamEnd::Faulted(reason) => {
                    if events
                        .send(InboundEvent::Error { reason })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
            tokio::time::sleep(self.reconnect_delay).await;
            tracing::debug!(%section, "re-establishing realtime stream");
        }
    }

    async fn consume(
        &self,
        section: Section,
        response: reqwest::Response,
        events: &mpsc::Sender<InboundEvent>,
    ) -> StreamEnd {
        let mut parser = SseParser::new();
        let mut mirror = serde_json::Value::Null;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => return StreamEnd::Faulted(err.to_string()),
            };
            for frame in parser.push(&String::from_utf8_lossy(&chunk)) {
                match handle_frame(&frame, &mut mirror) {
                    FrameOutcome::Update(payload) => {
                        let event = InboundEvent::Update {
                            payload,
                            received_at: now(),
                        };
                        if events.send(event).await.is_err() {
                            return StreamEnd::Cancelled;
                        }
                    }
                    FrameOutcome::Ignore => {}
                    FrameOutcome::Fault(reason) => {
                        tracing::warn!(%section, %reason, "realtime stream fault");
                        return StreamEnd::Faulted(reason);
                    }
                }
            }
        }
        StreamEnd::Faulted("stream ended".to_string())
    }
}

enum StreamEnd {
    /// Subscriber dropped the subscription; stop for good.
    Cancelled,
    /// The stream broke; reconnect after the delay.
    Faulted(String),
}

/// `put`/`patch` frame payload on the wire.
#[derive(Debug, Deserialize)]
struct ChangeEnvelope {
    path: String,
    data: serde_json::Value,
}

enum FrameOutcome {
    /// The watched subtree now holds this complete payload.
    Update(serde_json::Value),
    /// Heartbeat, or the subtree is (still) absent.
    Ignore,
    /// Server ended or revoked the stream.
    Fault(String),
}

fn handle_frame(frame: &SseFrame, mirror: &mut serde_json::Value) -> FrameOutcome {
    match frame.event.as_str() {
        kind @ ("put" | "patch") => {
            let envelope: ChangeEnvelope = match serde_json::from_str(&frame.data) {
                Ok(envelope) => envelope,
                Err(err) => return FrameOutcome::Fault(format!("malformed {kind} frame: {err}")),
            };
            if kind == "patch" {
                apply_patch(mirror, &envelope.path, envelope.data);
            } else {
                apply_put(mirror, &envelope.path, envelope.data);
            }
            if mirror.is_null() {
                // Absent subtree is not a state.
                FrameOutcome::Ignore
            } else {
                FrameOutcome::Update(mirror.clone())
            }
        }
        "keep-alive" => FrameOutcome::Ignore,
        "cancel" => FrameOutcome::Fault("stream cancelled by server".to_string()),
        "auth_revoked" => FrameOutcome::Fault("credentials revoked".to_string()),
        other => {
            tracing::debug!(event = other, "ignoring unknown stream event");
            FrameOutcome::Ignore
        }
    }
}

/// Replace the subtree at `path` (relative to the watched node) with `data`.
/// A `null` leaf removes the key; a `null` at the root clears the mirror.
fn apply_put(mirror: &mut serde_json::Value, path: &str, data: serde_json::Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((leaf, parents)) = segments.split_last() else {
        *mirror = data;
        return;
    };

    let mut node = mirror;
    for segment in parents {
        if !node.is_object() {
            *node = serde_json::Value::Object(serde_json::Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map
            .entry((*segment).to_string())
            .or_insert(serde_json::Value::Null);
    }
    if !node.is_object() {
        *node = serde_json::Value::Object(serde_json::Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };
    if data.is_null() {
        map.remove(*leaf);
    } else {
        map.insert((*leaf).to_string(), data);
    }
}

/// Merge every key of `data` under `path`, each as its own put.
fn apply_patch(mirror: &mut serde_json::Value, path: &str, data: serde_json::Value) {
    if let serde_json::Value::Object(entries) = data {
        for (key, value) in entries {
            apply_put(mirror, &format!("{path}/{key}"), value);
        }
    }
}

impl Transport for CloudKvTransport {
    fn subscribe(&self, section: Section) -> Subscription {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        tokio::spawn(self.clone().stream_section(section, tx));
        Subscription::new(rx)
    }

    fn write(
        &self,
        section: Section,
        value: SectionValue,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        async move {
            let response = self
                .client
                .put(self.section_url(section))
                .timeout(self.request_timeout)
                .json(&value.encode())
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        TransportError::timed_out(self.request_timeout)
                    } else {
                        TransportError::new(err.to_string())
                    }
                })?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(TransportError::bad_status(response.status().as_u16()).into())
            }
        }
    }

    fn ping(&self) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        async move {
            let response = self
                .client
                .get(self.root_url())
                .timeout(self.request_timeout)
                .send()
                .await
                .map_err(|err| TransportError::new(err.to_string()))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(TransportError::bad_status(response.status().as_u16()).into())
            }
        }
    }

    fn auto_reconnects(&self) -> bool {
        true
    }

    fn queues_when_offline(&self) -> bool {
        true
    }
}
