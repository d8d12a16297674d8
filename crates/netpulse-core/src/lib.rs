//! Core domain types for the netpulse dashboard sync engine.
//!
//! This crate provides the vocabulary shared by every other netpulse crate:
//! - `ConnectionStatus`: push-channel health as seen by the rest of the client
//! - `EventKind`, `EventPayload`, `InboundEvent`: typed push events
//! - `DashboardHandlers`: exhaustive per-kind handler table and `dispatch`
//! - `SliceKey`, `SliceUpdate`, `TimeRange`: addressing dashboard state slices
//! - `TimerSlot`: a single owned, cancellable timer per concern

pub mod error;
pub mod event;
pub mod handlers;
pub mod slice;
pub mod status;
pub mod timer;

pub use error::{CoreError, Result};
pub use event::{
    AlertCreated, ClassificationUpdate, DeviceStatusChange, DeviceTransition, DeviceUpdate,
    EventKind, EventPayload, InboundEvent, InterfaceThreshold, LatencySpike,
};
pub use handlers::{dispatch, DashboardHandlers};
pub use slice::{SliceKey, SliceUpdate, TimeRange};
pub use status::ConnectionStatus;
pub use timer::TimerSlot;
