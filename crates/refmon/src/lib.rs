//! refmon: game-controller state monitor.
//!
//! Listens for fixed-layout status packets over UDP, keeps a debounced view
//! of the current game phase, and supervises one child process per mapped
//! phase with escalating termination on every transition.

mod config;
mod latency;
mod receiver;
mod service;
mod state;
mod supervisor;

pub mod process;
pub mod protocol;

pub use config::{ConfigError, DEFAULT_PORT, MonitorConfig};
pub use latency::{LatencyTracker, Statistics};
pub use process::{
    ChildSpawner, CommandSpawner, LaunchRequest, ManagedChild, SpawnError, TerminationOutcome,
};
pub use protocol::{
    AckRecord, DecodeError, GamePhase, SecondaryPhase, StatusRecord, TeamColor, TeamInfo,
};
pub use receiver::StateReceiver;
pub use service::{Monitor, StatusSnapshot};
pub use state::{ObservedState, StateCell};
pub use supervisor::ProcessSupervisor;
