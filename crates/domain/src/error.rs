//! Common error types used across the workspace.
//!
//! The taxonomy mirrors what the synchronisation core can actually observe:
//! `transport` (network failure, timeout, non-2xx), `schema` (out-of-domain
//! inbound payload), `mode_locked` (manual command suppressed by AUTO mode),
//! and `not_connected` (command issued while the link is down). The `Display`
//! output of every variant starts with its stable taxonomy label so the
//! rendered string can be stored verbatim in `LinkState::last_error`.

/// Root error for the homelink core.
#[derive(Debug, thiserror::Error)]
pub enum HomeLinkError {
    /// Network failure, timeout, or non-2xx response from the peer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Inbound or outbound payload violates the section schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Manual command rejected because the device runs in AUTO mode.
    #[error("mode_locked: manual control is disabled while mode is AUTO")]
    ModeLocked,

    /// Command issued while the link is down and the transport does not
    /// buffer writes of its own accord.
    #[error("not_connected: the device link is down")]
    NotConnected,
}

impl HomeLinkError {
    /// The stable taxonomy label for this error.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Schema(_) => "schema",
            Self::ModeLocked => "mode_locked",
            Self::NotConnected => "not_connected",
        }
    }
}

/// Network-level failure talking to the device or the realtime store.
#[derive(Debug, thiserror::Error)]
#[error("transport: {reason}")]
pub struct TransportError {
    /// Human-readable reason surfaced to `LinkState::last_error`.
    pub reason: String,
}

impl TransportError {
    /// Build a transport error from any displayable cause.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// A request exceeded its deadline and was aborted.
    #[must_use]
    pub fn timed_out(after: std::time::Duration) -> Self {
        Self {
            reason: format!("request timed out after {}ms", after.as_millis()),
        }
    }

    /// The peer answered with a non-success HTTP status.
    #[must_use]
    pub fn bad_status(status: u16) -> Self {
        Self {
            reason: format!("unexpected HTTP status {status}"),
        }
    }
}

/// A payload that does not fit the declared section schema.
#[derive(Debug, thiserror::Error)]
#[error("schema: invalid {section} payload: {detail}")]
pub struct SchemaError {
    /// Wire name of the offending section.
    pub section: &'static str,
    /// What exactly was out of domain.
    pub detail: String,
}

impl SchemaError {
    /// Build a schema error for the given section.
    pub fn new(section: &'static str, detail: impl Into<String>) -> Self {
        Self {
            section,
            detail: detail.into(),
        }
    }
}
