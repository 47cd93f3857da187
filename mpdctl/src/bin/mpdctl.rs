//! Simulator-facing controller process.
//!
//! Resolves the test well, binds the controller socket and runs the control
//! loop until interrupted.
//!
//! # Usage
//!
//! ```sh
//! mpdctl --well 1
//! mpdctl --config mpd.json --remote-port 65000 --proportional-gain -0.002
//! ```
//!
//! Without `--well` (and no `well` in the config file) the well is chosen
//! from a console menu.
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: stop after the current iteration, exit 0

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use thiserror::Error;

use mpdctl::bootstrap::{BootstrapError, ConfiguredWell, ConsolePrompt, SetpointSource};
use mpdctl::config::{ConfigError, ControllerConfig};
use mpdctl::{Controller, ControllerError, ProportionalLaw, Well, init_tracing};

#[derive(Parser, Debug)]
#[command(author, version, about = "External choke controller for the MPD simulator")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Test well: 1-3 or bm01-bm03
    #[arg(short, long)]
    well: Option<Well>,

    /// Local IP address to bind
    #[arg(long)]
    local_address: Option<String>,

    /// Local UDP port to bind
    #[arg(long)]
    local_port: Option<u16>,

    /// Simulator IP address
    #[arg(long)]
    remote_address: Option<String>,

    /// Simulator UDP port
    #[arg(long)]
    remote_port: Option<u16>,

    /// Consecutive empty polls before resetting
    #[arg(long)]
    timeout_poll_count: Option<u32>,

    /// Sleep after an empty poll, in microseconds
    #[arg(long)]
    poll_sleep_interval_us: Option<u64>,

    /// Proportional gain of the choke law
    #[arg(long, allow_negative_numbers = true)]
    proportional_gain: Option<f64>,

    /// Kernel receive buffer size in bytes
    #[arg(long)]
    recv_buffer_size: Option<usize>,

    /// Log a summary every N advanced cycles (0 disables)
    #[arg(long)]
    summary_interval: Option<u64>,

    /// Pin the control loop to this CPU core
    #[arg(long)]
    cpu_core: Option<usize>,
}

impl Args {
    fn apply(self, config: &mut ControllerConfig) {
        if let Some(well) = self.well {
            config.well = Some(well);
        }
        if let Some(v) = self.local_address {
            config.local_address = v;
        }
        if let Some(v) = self.local_port {
            config.local_port = v;
        }
        if let Some(v) = self.remote_address {
            config.remote_address = v;
        }
        if let Some(v) = self.remote_port {
            config.remote_port = v;
        }
        if let Some(v) = self.timeout_poll_count {
            config.timeout_poll_count = v;
        }
        if let Some(v) = self.poll_sleep_interval_us {
            config.poll_sleep_interval = Duration::from_micros(v);
        }
        if let Some(v) = self.proportional_gain {
            config.proportional_gain = v;
        }
        if let Some(v) = self.recv_buffer_size {
            config.recv_buffer_size = Some(v);
        }
        if let Some(v) = self.summary_interval {
            config.summary_interval = v;
        }
        if let Some(v) = self.cpu_core {
            config.cpu_core = Some(v);
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("failed to install signal handler: {0}")]
    Signal(io::Error),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mpdctl: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    init_tracing();

    let (well, initial) = match config.well {
        Some(well) => ConfiguredWell(well).select_initial_setpoints()?,
        None => ConsolePrompt::stdio().select_initial_setpoints()?,
    };
    log_selected_well(well);

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown)).map_err(CliError::Signal)?;
    }

    let controller = Controller::bind(
        &config,
        ProportionalLaw::new(config.proportional_gain),
        initial,
    )?;
    controller.run(&shutdown)?;

    Ok(())
}

#[cfg(feature = "tracing")]
fn log_selected_well(well: Well) {
    tracing::info!(well = %well, "initial setpoints resolved");
}

#[cfg(not(feature = "tracing"))]
fn log_selected_well(_well: Well) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_named_after_config_options() {
        let args = Args::try_parse_from([
            "mpdctl",
            "--well",
            "bm02",
            "--timeout-poll-count",
            "250",
            "--poll-sleep-interval-us",
            "500",
            "--proportional-gain",
            "-0.002",
            "--recv-buffer-size",
            "1048576",
        ])
        .unwrap();

        let mut config = ControllerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.well, Some(Well::DeepwaterMpd));
        assert_eq!(config.timeout_poll_count, 250);
        assert_eq!(config.poll_sleep_interval, Duration::from_micros(500));
        assert_eq!(config.proportional_gain, -0.002);
        assert_eq!(config.recv_buffer_size, Some(1_048_576));
        assert_eq!(config.remote_port, 65000);
    }

    #[test]
    fn unknown_well_is_rejected() {
        assert!(Args::try_parse_from(["mpdctl", "--well", "7"]).is_err());
    }
}
