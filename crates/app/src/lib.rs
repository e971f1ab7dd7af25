//! # homelink-app
//!
//! Application layer — the device-state synchronisation core and its
//! **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the [`Transport`](ports::transport::Transport) port that the two
//!   back-end adapters (direct HTTP device, realtime KV store) implement
//! - Own the single mutable projection of device state
//!   ([`StateStore`](store::StateStore)) and fan out change notifications
//! - Validate and dispatch user commands ([`CommandGateway`](gateway::CommandGateway))
//! - Derive link liveness from transport signals and data freshness
//!   ([`liveness`], driven by the [`sync_engine`])
//! - Expose the read-only selectors and command handles screens consume
//!   ([`ViewHandle`](view::ViewHandle))
//!
//! ## Dependency rule
//! Depends on `homelink-domain` only (plus `tokio::sync`/`tokio::time` for
//! channels and timers). Never imports adapter crates. Adapters depend on
//! *this* crate, not the reverse.

pub mod gateway;
pub mod liveness;
pub mod ports;
pub mod store;
pub mod sync_engine;
pub mod view;
