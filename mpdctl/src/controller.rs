//! Transport loop: the single thread that talks to the simulator.
//!
//! # Iteration
//!
//! ```text
//! ┌─ send_pending? ── encode command ── send_to(peer) ── on_command_sent
//! │
//! ├─ try_recv_from (non-blocking)
//! │     ├─ nothing / wrong length / transient error ── on_empty_poll ── sleep
//! │     └─ 96 bytes ── decode ── on_measurement
//! │
//! └─ shutdown flag set? ── drop socket, return stats
//! ```
//!
//! The only suspension point is the sleep after an empty poll. Fatal socket
//! errors end the loop and are returned to the caller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//!
//! use mpdctl::bootstrap::Well;
//! use mpdctl::config::ControllerConfig;
//! use mpdctl::controller::Controller;
//! use mpdctl::law::ProportionalLaw;
//!
//! let config = ControllerConfig::default();
//! let shutdown = AtomicBool::new(false);
//! let controller = Controller::bind(
//!     &config,
//!     ProportionalLaw::new(config.proportional_gain),
//!     Well::Land.initial_setpoints(),
//! )?;
//! let stats = controller.run(&shutdown)?;
//! # Ok::<(), mpdctl::controller::ControllerError>(())
//! ```

use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::bootstrap::InitialSetpoints;
use crate::config::{ConfigError, ControllerConfig};
use crate::law::ControlLaw;
use crate::net::{Endpoint, UdpSocket};
use crate::protocol::{
    CommandFrame, FrameError, MEASUREMENT_LEN, MeasurementFrame, decode_measurement,
    encode_command,
};
use crate::session::{Session, Transition};
use crate::stats::LoopStats;
use crate::topology;
use crate::trace::{debug, info, warn};

/// Receive buffer length. One byte over a measurement so an oversized
/// datagram reads as the wrong length instead of being silently truncated.
const RECV_BUF_LEN: usize = MEASUREMENT_LEN + 1;

/// Fatal controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Failed to bind the UDP socket.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: Endpoint,
        source: io::Error,
    },
    /// Failed to apply a socket option.
    #[error("failed to configure socket: {0}")]
    Configure(io::Error),
    /// Sending a command failed.
    #[error("send to {peer} failed: {source}")]
    Send { peer: Endpoint, source: io::Error },
    /// Receiving failed with something other than `WouldBlock`.
    #[error("receive failed: {0}")]
    Receive(io::Error),
}

/// What came off the socket in one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Receipt {
    /// No datagram was waiting.
    Empty,
    /// A datagram arrived but was not a measurement.
    Discarded(FrameError),
    /// A transient socket error was absorbed.
    TransientError(ErrorKind),
    Measurement(MeasurementFrame),
}

/// Result of one [`Controller::poll_once`] iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOutcome {
    /// Command sent at the start of the iteration, if any.
    pub sent: Option<CommandFrame>,
    pub receipt: Receipt,
    pub transition: Transition,
}

/// Errors that mean "peer not there yet" rather than a broken socket.
///
/// Some stacks report an earlier ICMP port-unreachable on the next socket
/// call while the simulator is not running.
fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}

/// Owns the socket and the session for the lifetime of a run.
pub struct Controller<L> {
    socket: UdpSocket,
    local: Endpoint,
    peer: Endpoint,
    session: Session<L>,
    poll_sleep: Duration,
    summary_interval: u64,
    cpu_core: Option<usize>,
    stats: LoopStats,
    recv_buf: [u8; RECV_BUF_LEN],
}

impl<L: ControlLaw> Controller<L> {
    /// Validates `config`, binds the local socket and builds a fresh session.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the socket cannot be
    /// bound, or the receive buffer size cannot be applied.
    pub fn bind(
        config: &ControllerConfig,
        law: L,
        initial: InitialSetpoints,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let local = config.local_endpoint()?;
        let peer = config.remote_endpoint()?;
        let timeout_poll_count = config.timeout_polls()?;

        let socket = UdpSocket::bind(local).map_err(|source| ControllerError::Bind {
            endpoint: local,
            source,
        })?;
        let bound = socket.local_addr().map_err(ControllerError::Configure)?;

        if let Some(size) = config.recv_buffer_size {
            socket
                .set_recv_buffer_size(size)
                .map_err(ControllerError::Configure)?;
            debug!(
                requested = size,
                actual = socket.recv_buffer_size().unwrap_or(0),
                "receive buffer sized"
            );
        }

        info!(
            local = %bound,
            peer = %peer,
            timeout_poll_count,
            poll_sleep_us = u64::try_from(config.poll_sleep_interval.as_micros()).unwrap_or(u64::MAX),
            timeout_window_ms = u64::try_from(config.timeout_window().as_millis()).unwrap_or(u64::MAX),
            setpoint_a = initial.setpoint_a,
            setpoint_b = initial.setpoint_b,
            "controller bound"
        );

        Ok(Self {
            socket,
            local: bound,
            peer,
            session: Session::new(law, initial, timeout_poll_count),
            poll_sleep: config.poll_sleep_interval,
            summary_interval: config.summary_interval,
            cpu_core: config.cpu_core,
            stats: LoopStats::default(),
            recv_buf: [0u8; RECV_BUF_LEN],
        })
    }

    /// Address the controller is bound to, with the OS-assigned port.
    #[must_use]
    pub const fn local_addr(&self) -> Endpoint {
        self.local
    }

    #[must_use]
    pub const fn session(&self) -> &Session<L> {
        &self.session
    }

    #[must_use]
    pub const fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Runs iterations until `shutdown` is set, then releases the socket.
    ///
    /// # Errors
    ///
    /// Returns the first fatal send or receive error.
    pub fn run(mut self, shutdown: &AtomicBool) -> Result<LoopStats, ControllerError> {
        if let Some(core) = self.cpu_core {
            match topology::pin_current_thread(core) {
                Ok(()) => info!(core, "control loop pinned"),
                Err(_e) => warn!(core, error = %_e, "CPU pinning failed, running unpinned"),
            }
        }

        info!(peer = %self.peer, "controller running");

        while !shutdown.load(Ordering::Relaxed) {
            self.poll_once()?;
        }

        let stats = self.stats;
        info!(
            iterations = stats.iterations,
            commands_sent = stats.commands_sent,
            cycles_advanced = stats.cycles_advanced,
            stale = stats.stale_measurements,
            discarded = stats.discarded,
            timeouts = stats.timeouts,
            summaries = stats.summaries,
            "controller stopped"
        );
        Ok(stats)
    }

    /// Runs one send/receive iteration.
    ///
    /// Sleeps for the configured interval when nothing usable was received.
    ///
    /// # Errors
    ///
    /// Returns an error on a fatal send or receive failure.
    pub fn poll_once(&mut self) -> Result<PollOutcome, ControllerError> {
        self.stats.iterations += 1;

        let sent = if self.session.send_pending() {
            self.send_command()?
        } else {
            None
        };

        let receipt = self.receive()?;

        let transition = match receipt {
            Receipt::Measurement(m) => self.session.on_measurement(&m),
            Receipt::Empty | Receipt::Discarded(_) | Receipt::TransientError(_) => {
                let t = self.session.on_empty_poll();
                if !self.poll_sleep.is_zero() {
                    thread::sleep(self.poll_sleep);
                }
                t
            }
        };
        self.stats.record(&transition);

        if let (Transition::CycleAdvanced { cycle, .. }, Receipt::Measurement(_m)) =
            (transition, receipt)
        {
            if self.summary_due(cycle) {
                self.stats.summaries += 1;
                info!(
                    cycle,
                    t = _m.sim_time,
                    p = _m.pressure,
                    p_ref = _m.reference_pressure,
                    "cycle summary"
                );
            }
        }

        Ok(PollOutcome {
            sent,
            receipt,
            transition,
        })
    }

    fn send_command(&mut self) -> Result<Option<CommandFrame>, ControllerError> {
        let command = self.session.command();
        let bytes = encode_command(&command);
        let result = self.socket.try_send_to(&bytes, self.peer);
        self.finish_send(command, result)
    }

    /// Applies a send attempt to the session. Anything short of a completed
    /// send leaves the command pending for the next iteration.
    fn finish_send(
        &mut self,
        command: CommandFrame,
        result: io::Result<Option<usize>>,
    ) -> Result<Option<CommandFrame>, ControllerError> {
        match result {
            Ok(Some(_)) => {
                self.session.on_command_sent();
                self.stats.commands_sent += 1;
                Ok(Some(command))
            }
            Ok(None) => {
                self.stats.sends_deferred += 1;
                Ok(None)
            }
            Err(e) if is_transient(e.kind()) => {
                debug!(peer = %self.peer, error = %e, "send deferred");
                self.stats.transient_errors += 1;
                Ok(None)
            }
            Err(source) => Err(ControllerError::Send {
                peer: self.peer,
                source,
            }),
        }
    }

    fn receive(&mut self) -> Result<Receipt, ControllerError> {
        let (len, from) = match self.socket.try_recv_from(&mut self.recv_buf) {
            Ok(Some(got)) => got,
            Ok(None) => return Ok(Receipt::Empty),
            Err(e) if is_transient(e.kind()) => {
                debug!(error = %e, "receive error absorbed");
                self.stats.transient_errors += 1;
                return Ok(Receipt::TransientError(e.kind()));
            }
            Err(e) => return Err(ControllerError::Receive(e)),
        };

        if from != self.peer {
            debug!(from = %from, peer = %self.peer, "datagram from unexpected address");
            self.stats.foreign_datagrams += 1;
        }

        match decode_measurement(&self.recv_buf[..len]) {
            Ok(m) => Ok(Receipt::Measurement(m)),
            Err(e) => {
                debug!(from = %from, len, "discarding datagram");
                self.stats.discarded += 1;
                Ok(Receipt::Discarded(e))
            }
        }
    }

    fn summary_due(&self, cycle: i64) -> bool {
        self.summary_interval > 0
            && u64::try_from(cycle).is_ok_and(|c| c % self.summary_interval == 0)
    }
}
