//! `beacon` drives the physical indicators on the operator box: status LEDs,
//! the buzzer, and the polled GPIO input for the kill button.
//!
//! The [`scheduler`](scheduler) plays `(value, hold)` patterns on an output
//! [`sink`](sink) from a worker thread, with a follow-up queue and preemption.
//! The [`indicator`](indicator) module maps semantic LED/buzzer states onto
//! concrete patterns.

pub mod gpio;
pub mod indicator;
pub mod pattern;
pub mod scheduler;
pub mod sink;

pub use crate::indicator::{Buzzer, BuzzerState, KillSwitchLeds, Led, LedState};
pub use crate::pattern::{Pattern, Step, HOLD_FOREVER};
pub use crate::scheduler::Actuator;
pub use crate::sink::{FileSink, MemorySink, Sink};
