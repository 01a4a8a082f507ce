//! `tether` is the supervisory link between the topside operator box and the
//! vehicle. Both ends exchange compact fixed-layout status frames over UDP,
//! deliver fault notifications with acknowledgement, and keep a liveness view
//! of the peer.
//!
//! The layering, bottom up: a [`transceiver`](transceiver) moves datagrams, the
//! [`codec`](codec) turns them into frames, the [`store`](store) keeps the most
//! recent value of every field, the [`processor`](processor) pumps one full
//! decode/encode cycle per tick, and the [`link`](link) runs the protocol on
//! its own thread: heartbeats, connection state, acknowledged notifications.

pub mod codec;
pub mod danger;
pub mod error;
pub mod link;
pub mod logging;
pub mod processor;
pub mod store;
pub mod transceiver;
pub mod wire;

use std::time::Duration;

/// Interval at which a link emits its bump frame when nothing else went out.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// A peer silent for this long is considered disconnected.
pub const STALE_TIMEOUT: Duration = Duration::from_millis(500);

/// Upper bound on a single blocking receive, so the pump thread can service
/// its stop flag and heartbeats.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Pump thread yield between iterations. Keeps the field store mutex fair
/// towards callers on other threads.
pub const PUMP_TICK: Duration = Duration::from_millis(5);

/// Window a notification sender polls for an acknowledgement before
/// retransmitting.
pub const ACK_POLL_WINDOW: Duration = Duration::from_millis(50);

/// Overall deadline for an acknowledged notification send.
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(500);

pub use crate::error::{ErrorUtils, LinkError, LinkResult};
pub use crate::link::{Link, LinkCallbacks, LinkRole, NotificationOutcome};
pub use crate::wire::{
    DiagnosticState, KillSwitchState, LeakState, NotificationType, ThrusterState,
};
