//! External controller for a managed-pressure-drilling simulator.
//!
//! The simulator publishes one measurement datagram per simulation cycle over
//! UDP. The controller answers each new cycle with one command datagram
//! carrying fresh choke actuator weights, and resets itself to the well's
//! initial setpoints when the simulator goes quiet.
//!
//! - [`protocol`]: fixed-layout command and measurement frames
//! - [`session`]: cycle bookkeeping, send gating and timeout reset
//! - [`law`]: control laws ([`ProportionalLaw`] by default)
//! - [`controller`]: the non-blocking transport loop
//! - [`bootstrap`]: initial setpoints per test well
//! - [`config`]: runtime options

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod law;
pub mod net;
pub mod protocol;
pub mod session;
pub mod stats;
pub mod topology;
mod trace;

pub use bootstrap::{InitialSetpoints, SetpointSource, Well};
pub use config::ControllerConfig;
pub use controller::{Controller, ControllerError};
pub use law::{Actuation, ControlLaw, ProportionalLaw};
pub use protocol::{CommandFrame, MeasurementFrame};
pub use stats::LoopStats;
pub use trace::init_tracing;
