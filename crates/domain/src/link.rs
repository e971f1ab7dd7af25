//! Link state — the core's view of its connection to the transport peer.

use crate::time::Timestamp;

/// Observable condition of the logical link.
///
/// The invariant `loading ⇒ !connected` holds by construction: the state
/// starts loading, and every transition method clears `loading` before it
/// can set `connected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    /// The link has seen recent, successful traffic.
    pub connected: bool,
    /// No event has ever been received; the first one is still awaited.
    pub loading: bool,
    /// Last failure observed on the link, rendered via the error taxonomy
    /// (`transport: …`, `schema: …`). Cleared by the next successful refresh.
    pub last_error: Option<String>,
    /// When any section was last successfully refreshed.
    pub last_updated: Option<Timestamp>,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            connected: false,
            loading: true,
            last_error: None,
            last_updated: None,
        }
    }
}

impl LinkState {
    /// Transition to connected. Clears the loading flag.
    pub fn mark_connected(&mut self) {
        self.loading = false;
        self.connected = true;
    }

    /// Transition to offline. Clears the loading flag: by the time the link
    /// is declared down, the initial wait is over.
    pub fn mark_offline(&mut self) {
        self.loading = false;
        self.connected = false;
    }

    /// Record a successful section refresh.
    ///
    /// `last_updated` is monotone: an event carrying an older receipt time
    /// than the current watermark leaves it unchanged.
    pub fn refreshed(&mut self, at: Timestamp) {
        match self.last_updated {
            Some(prev) if prev >= at => {}
            _ => self.last_updated = Some(at),
        }
        self.last_error = None;
    }

    /// Record a failure without touching connectivity.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }
}
