//! Counters for benchmarking the various phases of a solve.

use std::fmt::{Display, Formatter, Result};

/// A timer.
///
/// Timings are only collected when the `profiler` feature is enabled; otherwise
/// every timer reads as zero.
#[derive(Copy, Clone, Debug, Default)]
pub struct Timer {
    time: f64,
    #[allow(dead_code)] // The field isn't used if the `profiler` feature isn't enabled.
    start: Option<f64>,
}

impl Timer {
    /// Creates a new timer initialized to zero and not started.
    pub fn new() -> Self {
        Timer {
            time: 0.0,
            start: None,
        }
    }

    /// Resets the timer to 0.
    pub fn reset(&mut self) {
        self.time = 0.0
    }

    /// Start the timer.
    pub fn start(&mut self) {
        #[cfg(feature = "profiler")]
        {
            self.time = 0.0;
            self.start = Some(instant::now());
        }
    }

    /// Pause the timer.
    pub fn pause(&mut self) {
        #[cfg(feature = "profiler")]
        {
            if let Some(start) = self.start {
                self.time += instant::now() - start;
            }
            self.start = None;
        }
    }

    /// The measured time between the last `.start()` and `.pause()` calls.
    pub fn time(&self) -> f64 {
        self.time
    }
}

impl Display for Timer {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}s", self.time)
    }
}

/// Performance counters of the last `solve` call.
#[derive(Copy, Clone, Debug, Default)]
pub struct SolverCounters {
    /// Number of contact joints solved.
    pub njoints: usize,
    /// Number of joints that landed in SIMD-safe groups; the rest ran scalar.
    pub ngrouped_joints: usize,
    /// The average-iteration metric returned by the last solve.
    pub iteration_metric: f32,
    /// Time spent copying bodies/joints in and grouping them.
    pub prepare_time: Timer,
    /// Time spent recomputing limiters from the contact points.
    pub refresh_time: Timer,
    /// Time spent in warm-start and velocity-impulse iterations.
    pub impulse_time: Timer,
    /// Time spent in displacement (position-correction) iterations.
    pub displacement_time: Timer,
    /// Time spent copying results back out.
    pub finish_time: Timer,
}

impl SolverCounters {
    /// Creates a new set of counters initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all the counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Display for SolverCounters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Number of joints: {}", self.njoints)?;
        writeln!(f, "Number of grouped joints: {}", self.ngrouped_joints)?;
        writeln!(f, "Iteration metric: {}", self.iteration_metric)?;
        writeln!(f, "Prepare time: {}", self.prepare_time)?;
        writeln!(f, "Refresh time: {}", self.refresh_time)?;
        writeln!(f, "Impulse time: {}", self.impulse_time)?;
        writeln!(f, "Displacement time: {}", self.displacement_time)?;
        writeln!(f, "Finish time: {}", self.finish_time)
    }
}
