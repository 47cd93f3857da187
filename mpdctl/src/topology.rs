//! Pinning the control loop to a CPU core.
//!
//! The loop is a single thread that sleeps in 1ms steps, so scheduler
//! migrations show up directly as cycle jitter. Pinning is opt-in and only
//! ever applied to the calling thread.

use core_affinity::CoreId;
use thiserror::Error;

/// Errors pinning the current thread.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PinError {
    /// Core is not in this process's affinity set.
    #[error("core {core} is not available (cores: {available:?})")]
    NotAvailable { core: usize, available: Vec<usize> },
    /// The OS refused the affinity change.
    #[error("OS rejected pinning to core {0}")]
    Rejected(usize),
}

/// Core IDs this process may run on.
#[must_use]
pub fn available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .map(|ids| ids.into_iter().map(|id| id.id).collect())
        .unwrap_or_default()
}

/// Pins the calling thread to `core`.
///
/// # Errors
///
/// Returns an error if the core is not available or the OS denies the request.
pub fn pin_current_thread(core: usize) -> Result<(), PinError> {
    let available = available_cores();
    if !available.contains(&core) {
        return Err(PinError::NotAvailable { core, available });
    }
    if core_affinity::set_for_current(CoreId { id: core }) {
        Ok(())
    } else {
        Err(PinError::Rejected(core))
    }
}
