//! Simulation parameters.

use error_stack::Report;

use crate::error::ConfigError;

/// Validated driver input: how many peers take part, and for how many
/// logical-clock ticks the transport keeps delivering.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimulationConfig {
    pub process_count: usize,
    /// Time horizon in logical-clock ticks. The first message whose
    /// timestamp reaches this value terminates the run.
    pub duration: u64,
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Rejects fewer than two processes or a zero duration.
    pub fn new(process_count: usize, duration: u64) -> Result<Self, Report<ConfigError>> {
        if process_count < 2 {
            return Err(Report::new(ConfigError::TooFewProcesses(process_count)));
        }
        if duration == 0 {
            return Err(Report::new(ConfigError::ZeroDuration));
        }
        Ok(Self {
            process_count,
            duration,
        })
    }
}
