//! Liveness monitor — classifies the link from transport signals and data
//! freshness.
//!
//! The state machine itself is pure (fed explicit instants so it can be
//! tested without sleeping); the async driver loop lives in the
//! [`sync_engine`](crate::sync_engine).

use tokio::time::{Duration, Instant};

/// Phase of the link state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// No successful event has ever been observed.
    Loading,
    /// The link has seen recent, successful traffic.
    Connected,
    /// A transport error was observed or the data went stale.
    Offline,
}

/// Pure link state machine.
///
/// Transitions:
/// - initial phase is [`Loading`](LinkPhase::Loading);
/// - any successful event (inbound update or ping) → [`Connected`](LinkPhase::Connected);
/// - a transport error, or no successful event within the staleness window →
///   [`Offline`](LinkPhase::Offline);
/// - while offline, [`ping_due`](Self::ping_due) paces reconnection probes.
#[derive(Debug)]
pub struct LivenessMachine {
    phase: LinkPhase,
    started: Instant,
    last_ok: Option<Instant>,
    last_ping: Option<Instant>,
    staleness: Duration,
    ping_interval: Duration,
}

impl LivenessMachine {
    /// Create a machine in the loading phase, with freshness measured from
    /// `now`.
    #[must_use]
    pub fn new(now: Instant, staleness: Duration, ping_interval: Duration) -> Self {
        Self {
            phase: LinkPhase::Loading,
            started: now,
            last_ok: None,
            last_ping: None,
            staleness,
            ping_interval,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    /// A successful event (inbound update or ping) was observed.
    /// Returns the new phase when this caused a transition.
    pub fn on_event(&mut self, now: Instant) -> Option<LinkPhase> {
        self.last_ok = Some(now);
        self.transition_to(LinkPhase::Connected)
    }

    /// A transport error was observed on a subscription.
    /// Returns the new phase when this caused a transition.
    pub fn on_transport_error(&mut self) -> Option<LinkPhase> {
        self.transition_to(LinkPhase::Offline)
    }

    /// Periodic freshness check. Drops the link when no successful event
    /// arrived within the staleness window.
    /// Returns the new phase when this caused a transition.
    pub fn on_tick(&mut self, now: Instant) -> Option<LinkPhase> {
        if self.phase == LinkPhase::Offline {
            return None;
        }
        let reference = self.last_ok.unwrap_or(self.started);
        if now.duration_since(reference) >= self.staleness {
            self.transition_to(LinkPhase::Offline)
        } else {
            None
        }
    }

    /// Whether a reconnection ping should be issued now. Paces probes to one
    /// per ping interval and only while offline.
    pub fn ping_due(&mut self, now: Instant) -> bool {
        if self.phase != LinkPhase::Offline {
            return false;
        }
        let due = match self.last_ping {
            None => true,
            Some(last) => now.duration_since(last) >= self.ping_interval,
        };
        if due {
            self.last_ping = Some(now);
        }
        due
    }

    fn transition_to(&mut self, next: LinkPhase) -> Option<LinkPhase> {
        if self.phase == next {
            None
        } else {
            self.phase = next;
            Some(next)
        }
    }
}
