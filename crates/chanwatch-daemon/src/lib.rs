//! chanwatch daemon library logic.
//!
//! Wires a [`ChannelObserver`](chanwatch_presence::ChannelObserver) to a
//! newline-delimited JSON transition stream and reports membership events
//! through `tracing`.

pub mod config;
pub mod error;
pub mod lookup;
pub mod source;
pub mod watch;

pub use error::DaemonError;
