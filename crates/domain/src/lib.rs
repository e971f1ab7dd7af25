//! # homelink-domain
//!
//! Pure domain model for the homelink device-state synchronisation core.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps
//! - Define the three device **sections** (control, monitoring, status) that
//!   travel as atomic payloads over the wire
//! - Define the **link** projection (connected/loading/lastError/lastUpdated)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod control;
pub mod link;
pub mod monitoring;
pub mod section;
pub mod status;
