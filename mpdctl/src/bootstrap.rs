//! Initial setpoints for a controller run.
//!
//! The controller needs one pair of starting choke setpoints per run, chosen by
//! test well. The pair is resolved once before the loop starts and kept for the
//! whole process so a timeout can restore it. Where the pair comes from is a
//! [`SetpointSource`]: normally the configured well, or an interactive menu
//! when none is configured.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Errors resolving initial setpoints.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Well identifier is not one of the known wells.
    #[error("unknown well {0:?}, expected 1, 2 or 3")]
    UnknownWell(String),
    /// Console reached end of input before a valid selection.
    #[error("console closed before a well was selected")]
    ConsoleClosed,
    /// Console I/O failed.
    #[error("console I/O: {0}")]
    Io(#[from] io::Error),
}

/// Starting setpoints for channels A and B.
///
/// Immutable once produced; the session restores these on timeout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialSetpoints {
    pub setpoint_a: f64,
    pub setpoint_b: f64,
}

impl InitialSetpoints {
    #[must_use]
    pub const fn new(setpoint_a: f64, setpoint_b: f64) -> Self {
        Self {
            setpoint_a,
            setpoint_b,
        }
    }
}

/// Benchmark test wells known to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum Well {
    /// BM01, land rig.
    Land,
    /// BM02, deepwater managed pressure drilling.
    DeepwaterMpd,
    /// BM03, deepwater controlled mud level.
    DeepwaterCml,
}

impl Well {
    pub const ALL: [Self; 3] = [Self::Land, Self::DeepwaterMpd, Self::DeepwaterCml];

    /// Menu number, 1-based.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Land => 1,
            Self::DeepwaterMpd => 2,
            Self::DeepwaterCml => 3,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Land => "BM01 Land",
            Self::DeepwaterMpd => "BM02 Deepwater MPD",
            Self::DeepwaterCml => "BM03 Deepwater CML",
        }
    }

    /// Choke setpoints the simulator's operating point expects for this well.
    #[must_use]
    pub const fn initial_setpoints(self) -> InitialSetpoints {
        match self {
            Self::Land => InitialSetpoints::new(0.4356, 0.0),
            Self::DeepwaterMpd | Self::DeepwaterCml => InitialSetpoints::new(0.5871, 0.0),
        }
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Well {
    type Error = BootstrapError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|w| w.number() == n)
            .ok_or_else(|| BootstrapError::UnknownWell(n.to_string()))
    }
}

impl FromStr for Well {
    type Err = BootstrapError;

    /// Accepts the menu number (`2`) or the benchmark code (`bm02`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("bm")
            .or_else(|| s.strip_prefix("BM"))
            .unwrap_or(s);
        digits
            .parse::<u8>()
            .map_err(|_| BootstrapError::UnknownWell(s.to_owned()))
            .and_then(Self::try_from)
    }
}

/// Anything that can produce the run's initial setpoints.
pub trait SetpointSource {
    /// Called exactly once, before the control loop starts.
    ///
    /// # Errors
    ///
    /// Returns an error if no setpoints can be resolved.
    fn select_initial_setpoints(&mut self) -> Result<(Well, InitialSetpoints), BootstrapError>;
}

/// A well fixed by configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredWell(pub Well);

impl SetpointSource for ConfiguredWell {
    fn select_initial_setpoints(&mut self) -> Result<(Well, InitialSetpoints), BootstrapError> {
        Ok((self.0, self.0.initial_setpoints()))
    }
}

/// Interactive well menu on a line-oriented console.
///
/// Re-prompts until a valid number is entered.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn print_menu(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- Select Test Well ---")?;
        for well in Well::ALL {
            writeln!(self.output, "[{}] {}", well.number(), well.name())?;
        }
        writeln!(self.output, "------------------------")
    }
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> SetpointSource for ConsolePrompt<R, W> {
    fn select_initial_setpoints(&mut self) -> Result<(Well, InitialSetpoints), BootstrapError> {
        self.print_menu()?;
        let mut line = String::new();
        loop {
            write!(self.output, "Enter number for test well: ")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(BootstrapError::ConsoleClosed);
            }

            match line.trim().parse::<u8>().map(Well::try_from) {
                Ok(Ok(well)) => {
                    writeln!(self.output, "Selected well: {well}")?;
                    return Ok((well, well.initial_setpoints()));
                }
                Ok(Err(_)) => writeln!(self.output, "Invalid selection. Please enter 1, 2, or 3.")?,
                Err(_) => writeln!(self.output, "Invalid input. Please enter a number.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn land_well_setpoints() {
        let sp = Well::Land.initial_setpoints();
        assert_eq!(sp, InitialSetpoints::new(0.4356, 0.0));
    }

    #[test]
    fn deepwater_wells_share_setpoints() {
        assert_eq!(
            Well::DeepwaterMpd.initial_setpoints(),
            Well::DeepwaterCml.initial_setpoints()
        );
        assert_eq!(Well::DeepwaterMpd.initial_setpoints().setpoint_a, 0.5871);
    }

    #[test]
    fn parse_number_and_code() {
        assert_eq!("1".parse::<Well>().unwrap(), Well::Land);
        assert_eq!("bm02".parse::<Well>().unwrap(), Well::DeepwaterMpd);
        assert_eq!(" BM03 ".parse::<Well>().unwrap(), Well::DeepwaterCml);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(matches!(
            "4".parse::<Well>(),
            Err(BootstrapError::UnknownWell(_))
        ));
        assert!("land".parse::<Well>().is_err());
        assert!(Well::try_from(0).is_err());
    }

    #[test]
    fn deserialize_from_number() {
        let well: Well = serde_json::from_str("3").unwrap();
        assert_eq!(well, Well::DeepwaterCml);
        assert!(serde_json::from_str::<Well>("9").is_err());
    }

    #[test]
    fn configured_well_source() {
        let (well, sp) = ConfiguredWell(Well::Land)
            .select_initial_setpoints()
            .unwrap();
        assert_eq!(well, Well::Land);
        assert_eq!(sp.setpoint_a, 0.4356);
    }

    #[test]
    fn console_reprompts_until_valid() {
        let input = b"abc\n7\n2\n".as_slice();
        let mut output = Vec::new();
        let (well, sp) = ConsolePrompt::new(input, &mut output)
            .select_initial_setpoints()
            .unwrap();
        assert_eq!(well, Well::DeepwaterMpd);
        assert_eq!(sp.setpoint_a, 0.5871);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("[3] BM03 Deepwater CML"));
        assert!(text.contains("Invalid input. Please enter a number."));
        assert!(text.contains("Invalid selection. Please enter 1, 2, or 3."));
        assert!(text.contains("Selected well: BM02 Deepwater MPD"));
    }

    #[test]
    fn console_eof_is_an_error() {
        let mut output = Vec::new();
        let result = ConsolePrompt::new(b"".as_slice(), &mut output).select_initial_setpoints();
        assert!(matches!(result, Err(BootstrapError::ConsoleClosed)));
    }
}
