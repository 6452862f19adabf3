use serde::{Deserialize, Serialize};

/// The time step handed to models on every loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeStep {
    pub time: f64,
    pub dt: f64,
    pub target_time: f64,
    pub number: u32,
}

/// Stepping state of one time loop.
///
/// The loop always runs at least once, never advances past the target, and stops as
/// soon as the time is within `tolerance` of the target.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeLoopState {
    time: f64,
    target_time: f64,
    tolerance: f64,
    number: u32,
    compute: bool,
}

impl TimeLoopState {
    pub fn new(start_time: f64, target_time: f64, tolerance: f64) -> Self {
        Self {
            time: start_time,
            target_time,
            tolerance,
            number: 0,
            compute: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.compute
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances by `dt`, clamping to the target, and returns the new step.
    pub fn advance(&mut self, dt: f64) -> TimeStep {
        self.number += 1;
        self.time = (self.time + dt).min(self.target_time);
        if self.time + self.tolerance > self.target_time {
            self.compute = false;
        }
        TimeStep {
            time: self.time,
            dt,
            target_time: self.target_time,
            number: self.number,
        }
    }
}
