//! Controller session: the state carried between loop iterations and the
//! rules for when the law fires, when a command goes out, and when the whole
//! session resets.
//!
//! # States
//!
//! ```text
//!                  measurement, cycle > prev
//!   AwaitingResponse ──────────────────────────► CycleAdvanced
//!        ▲     │                                      │
//!        │     │ timeout_poll_count empty polls       │ command sent
//!        │     ▼                                      │
//!        │   TimedOut ────────────────────────────────┤
//!        │                                            │
//!        └────────────────────────────────────────────┘
//! ```
//!
//! Both `CycleAdvanced` and `TimedOut` set `send_pending`; the loop sends the
//! next command on its following iteration, which moves the session back to
//! `AwaitingResponse`. A duplicate or stale cycle index never sets
//! `send_pending`, so at most one command is outstanding per cycle.

use std::num::NonZeroU32;
use std::time::Duration;

use minstant::Instant;

use crate::bootstrap::InitialSetpoints;
use crate::law::{Actuation, ControlLaw};
use crate::protocol::{CommandFrame, MeasurementFrame};
use crate::trace::{debug, info, warn};

/// Where the session is in the send/receive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A command is out; waiting for a measurement with a newer cycle.
    AwaitingResponse,
    /// A newer cycle arrived and the law has run; next command pending.
    CycleAdvanced,
    /// No measurement for the configured number of polls; state was reset.
    TimedOut,
}

/// Mutable controller state, owned by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Cycle index of the most recent measurement, echoed in commands.
    pub cycle_index: i64,
    /// Highest cycle index the law has run for.
    pub prev_cycle_index: i64,
    pub setpoint_a: f64,
    pub setpoint_b: f64,
    pub actuation: Actuation,
    /// Next loop iteration must send a command.
    pub send_pending: bool,
    pub consecutive_empty_polls: u32,
}

impl ControllerState {
    /// Fresh state; the first iteration always sends.
    #[must_use]
    pub const fn new(initial: InitialSetpoints) -> Self {
        Self {
            cycle_index: 0,
            prev_cycle_index: 0,
            setpoint_a: initial.setpoint_a,
            setpoint_b: initial.setpoint_b,
            actuation: Actuation::ZERO,
            send_pending: true,
            consecutive_empty_polls: 0,
        }
    }

    /// The command that reflects this state.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn command(&self) -> CommandFrame {
        CommandFrame {
            cycle_index: self.cycle_index as f64,
            setpoint_a: self.setpoint_a,
            setpoint_b: self.setpoint_b,
            weight_a: self.actuation.weight_a,
            weight_b: self.actuation.weight_b,
            control_energy: self.actuation.control_energy,
        }
    }
}

/// What a single session event did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Empty poll below the timeout threshold.
    Idle { empty_polls: u32 },
    /// Measurement accepted but its cycle did not advance; mirrored fields
    /// updated, no law run, no resend.
    Mirrored { cycle: i64 },
    /// Law ran for a new cycle; a command is pending.
    CycleAdvanced { cycle: i64, actuation: Actuation },
    /// Session reset after `polls` consecutive empty polls.
    TimedOut { polls: u32, elapsed: Duration },
}

/// Controller session driven by the transport loop.
pub struct Session<L> {
    law: L,
    initial: InitialSetpoints,
    timeout_poll_count: NonZeroU32,
    state: ControllerState,
    phase: SessionState,
    /// Last send or measurement, for the timeout log line.
    last_activity: Instant,
}

impl<L: ControlLaw> Session<L> {
    /// Creates a session in `AwaitingResponse` with a send pending.
    #[must_use]
    pub fn new(law: L, initial: InitialSetpoints, timeout_poll_count: NonZeroU32) -> Self {
        Self {
            law,
            initial,
            timeout_poll_count,
            state: ControllerState::new(initial),
            phase: SessionState::AwaitingResponse,
            last_activity: Instant::now(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ControllerState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> SessionState {
        self.phase
    }

    #[must_use]
    pub const fn law(&self) -> &L {
        &self.law
    }

    #[must_use]
    pub const fn send_pending(&self) -> bool {
        self.state.send_pending
    }

    /// Command to transmit for the current state.
    #[must_use]
    pub fn command(&self) -> CommandFrame {
        self.state.command()
    }

    /// Records that the pending command went out.
    pub fn on_command_sent(&mut self) {
        self.phase = SessionState::AwaitingResponse;
        self.state.send_pending = false;
        self.state.consecutive_empty_polls = 0;
        self.last_activity = Instant::now();
    }

    /// Applies a well-formed measurement.
    pub fn on_measurement(&mut self, m: &MeasurementFrame) -> Transition {
        let cycle = m.cycle();

        self.state.consecutive_empty_polls = 0;
        self.last_activity = Instant::now();
        self.state.cycle_index = cycle;
        self.state.setpoint_a = m.setpoint_a;
        self.state.setpoint_b = m.setpoint_b;

        if cycle <= self.state.prev_cycle_index {
            debug!(cycle, prev = self.state.prev_cycle_index, "stale measurement");
            return Transition::Mirrored { cycle };
        }

        let actuation = self.law.update(m, &self.state.actuation);
        self.state.actuation = actuation;
        self.state.prev_cycle_index = cycle;
        self.state.send_pending = true;
        self.phase = SessionState::CycleAdvanced;

        info!(
            sim_time = m.sim_time,
            cycle,
            weight_a = actuation.weight_a,
            measurement = %m,
            "measurement"
        );

        Transition::CycleAdvanced { cycle, actuation }
    }

    /// Applies a poll that produced no usable measurement.
    pub fn on_empty_poll(&mut self) -> Transition {
        self.state.consecutive_empty_polls += 1;
        let polls = self.state.consecutive_empty_polls;

        if polls < self.timeout_poll_count.get() {
            return Transition::Idle { empty_polls: polls };
        }

        let elapsed = self.last_activity.elapsed();
        warn!(
            polls,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "no measurement, resetting control variables"
        );

        self.state = ControllerState::new(self.initial);
        self.phase = SessionState::TimedOut;
        self.last_activity = Instant::now();

        Transition::TimedOut { polls, elapsed }
    }
}
