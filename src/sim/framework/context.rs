use crate::sim::config::SimConfig;
use crate::sim::time::SimTime;

/// Shared read-only context passed to every component step.
///
/// Components never reach for global settings; everything run-wide comes
/// through here.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub config: &'a SimConfig,
    pub time: &'a SimTime,
    /// Base-step index, 0 on the first simulated step.
    pub step_index: usize,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a SimConfig, time: &'a SimTime) -> Self {
        Self {
            config,
            time,
            step_index: time.index,
        }
    }

    pub fn is_first_step(&self) -> bool {
        self.step_index == 0
    }

    /// Index of the control step this base step belongs to.
    pub fn control_index(&self) -> usize {
        self.step_index / self.config.control_ratio().max(1)
    }

    pub fn is_control_step(&self) -> bool {
        self.config.is_control_step(self.step_index)
    }

    /// Base step length in seconds.
    pub fn dt(&self) -> f64 {
        self.config.dt()
    }
}
