//! Counters for one controller run.

use crate::session::Transition;

/// Running totals, reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    pub commands_sent: u64,
    /// Sends deferred because the socket would block.
    pub sends_deferred: u64,
    pub measurements: u64,
    /// Measurements whose cycle did not advance.
    pub stale_measurements: u64,
    pub cycles_advanced: u64,
    /// Datagrams dropped for having the wrong length.
    pub discarded: u64,
    /// Datagrams from an address other than the configured peer.
    pub foreign_datagrams: u64,
    /// Receive or send errors absorbed as an empty poll.
    pub transient_errors: u64,
    pub empty_polls: u64,
    pub timeouts: u64,
    /// Summary lines logged.
    pub summaries: u64,
}

impl LoopStats {
    pub(crate) fn record(&mut self, transition: &Transition) {
        match transition {
            Transition::Idle { .. } => self.empty_polls += 1,
            Transition::Mirrored { .. } => {
                self.measurements += 1;
                self.stale_measurements += 1;
            }
            Transition::CycleAdvanced { .. } => {
                self.measurements += 1;
                self.cycles_advanced += 1;
            }
            Transition::TimedOut { .. } => {
                self.empty_polls += 1;
                self.timeouts += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::law::Actuation;

    #[test]
    fn record_buckets_transitions() {
        let mut stats = LoopStats::default();
        stats.record(&Transition::Idle { empty_polls: 1 });
        stats.record(&Transition::Mirrored { cycle: 3 });
        stats.record(&Transition::CycleAdvanced {
            cycle: 4,
            actuation: Actuation::ZERO,
        });
        stats.record(&Transition::TimedOut {
            polls: 2,
            elapsed: Duration::ZERO,
        });

        assert_eq!(stats.empty_polls, 2);
        assert_eq!(stats.measurements, 2);
        assert_eq!(stats.stale_measurements, 1);
        assert_eq!(stats.cycles_advanced, 1);
        assert_eq!(stats.timeouts, 1);
    }
}
