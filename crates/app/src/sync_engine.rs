//! Sync engine — background wiring between the transport, the store, and the
//! liveness monitor.
//!
//! One pump task per section forwards inbound events into the store in
//! arrival order; a driver task feeds the [`LivenessMachine`] and issues
//! reconnection pings while the link is offline. Everything stops when the
//! engine is shut down (or when all subscriptions end).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use homelink_domain::error::TransportError;
use homelink_domain::section::Section;

use crate::liveness::{LinkPhase, LivenessMachine};
use crate::ports::{InboundEvent, Subscription, Transport};
use crate::store::StateStore;

/// Timing and threshold knobs of the synchronisation core.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hard deadline for a single write.
    pub write_timeout: Duration,
    /// Interval without a successful event after which the link is declared
    /// offline.
    pub staleness: Duration,
    /// Pace of reconnection pings while offline (non-auto-reconnecting
    /// transports only).
    pub ping_interval: Duration,
    /// Ampere threshold for the `high_current` selector (strict `>`).
    pub current_threshold: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(5),
            staleness: Duration::from_secs(10),
            ping_interval: Duration::from_secs(5),
            current_threshold: 5.0,
        }
    }
}

/// Internal signal from the section pumps to the liveness driver.
enum LinkSignal {
    /// A payload was applied to the store.
    Healthy,
    /// A subscription observed a transport failure.
    Fault(String),
}

/// Cadence of the liveness driver's freshness checks.
const TICK: Duration = Duration::from_millis(250);

/// Running synchronisation core.
///
/// Created by [`start`](Self::start); dropped subscriptions and tasks stop on
/// [`shutdown`](Self::shutdown).
pub struct SyncEngine {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    /// Subscribe to all sections of `transport` and start the background
    /// tasks projecting them into `store`.
    pub fn start<T>(transport: T, store: Arc<StateStore>, config: &SyncConfig) -> Self
    where
        T: Transport + Clone + 'static,
    {
        let (signal_tx, signal_rx) = mpsc::channel(32);

        let mut tasks = Vec::with_capacity(Section::ALL.len() + 1);
        for section in Section::ALL {
            let subscription = transport.subscribe(section);
            tasks.push(tokio::spawn(pump(
                section,
                subscription,
                Arc::clone(&store),
                signal_tx.clone(),
            )));
        }
        drop(signal_tx);

        tasks.push(tokio::spawn(drive_liveness(
            transport,
            store,
            signal_rx,
            config.staleness,
            config.ping_interval,
        )));

        Self { tasks }
    }

    /// Stop all background tasks. In-flight writes issued through the
    /// gateway are unaffected (their results are simply ignored).
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Forward one section's inbound events into the store, in arrival order.
async fn pump(
    section: Section,
    mut subscription: Subscription,
    store: Arc<StateStore>,
    signals: mpsc::Sender<LinkSignal>,
) {
    while let Some(event) = subscription.recv().await {
        match event {
            InboundEvent::Update {
                payload,
                received_at,
            } => match store.apply(section, &payload, received_at) {
                Ok(()) => {
                    let _ = signals.send(LinkSignal::Healthy).await;
                }
                Err(err) => {
                    // Schema rejections stay local: the store already
                    // recorded the error and connectivity is untouched.
                    tracing::warn!(%section, %err, "rejected inbound payload");
                }
            },
            InboundEvent::Error { reason } => {
                let _ = signals.send(LinkSignal::Fault(reason)).await;
            }
        }
    }
    tracing::debug!(%section, "section subscription ended");
}

/// Feed the liveness machine from pump signals and the staleness clock, and
/// probe for reconnection while offline.
async fn drive_liveness<T: Transport>(
    transport: T,
    store: Arc<StateStore>,
    mut signals: mpsc::Receiver<LinkSignal>,
    staleness: Duration,
    ping_interval: Duration,
) {
    let mut machine = LivenessMachine::new(Instant::now(), staleness, ping_interval);
    let mut tick = tokio::time::interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                None => break,
                Some(LinkSignal::Healthy) => {
                    apply_transition(&store, machine.on_event(Instant::now()));
                }
                Some(LinkSignal::Fault(reason)) => {
                    store.record_error(TransportError::new(reason).to_string());
                    apply_transition(&store, machine.on_transport_error());
                }
            },
            _ = tick.tick() => {
                let now = Instant::now();
                apply_transition(&store, machine.on_tick(now));
                if !transport.auto_reconnects() && machine.ping_due(now) {
                    match transport.ping().await {
                        Ok(()) => apply_transition(&store, machine.on_event(Instant::now())),
                        Err(err) => tracing::debug!(%err, "reconnection ping failed"),
                    }
                }
            }
        }
    }
}

fn apply_transition(store: &StateStore, change: Option<LinkPhase>) {
    match change {
        Some(LinkPhase::Connected) => store.mark_connected(),
        Some(LinkPhase::Offline) => store.mark_offline(),
        Some(LinkPhase::Loading) | None => {}
    }
}
