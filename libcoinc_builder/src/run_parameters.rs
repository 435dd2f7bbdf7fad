//! Per-frontend run timing parameters.

use super::constants::NUM_FRONTENDS;
use super::nodata::NO_DATA;
use super::variables::VariableSource;

const VARS_BASE: &str = "/Experiment/Run Parameters";

/// Run and trigger start/stop times, one slot per frontend
/// (`[0]` head, `[1]` tail). Used downstream for runtime and livetime.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub run_start: [f64; NUM_FRONTENDS],
    pub run_stop: [f64; NUM_FRONTENDS],
    pub trigger_start: [f64; NUM_FRONTENDS],
    pub trigger_stop: [f64; NUM_FRONTENDS],
}

impl RunParameters {
    pub fn new() -> Self {
        RunParameters {
            run_start: [NO_DATA; NUM_FRONTENDS],
            run_stop: [NO_DATA; NUM_FRONTENDS],
            trigger_start: [NO_DATA; NUM_FRONTENDS],
            trigger_stop: [NO_DATA; NUM_FRONTENDS],
        }
    }

    pub fn reset(&mut self) {
        *self = RunParameters::new();
    }

    /// Read all four parameter pairs from the configuration store. Missing
    /// keys warn and stay at the sentinel.
    pub fn read_data(&mut self, source: &dyn VariableSource) {
        for (key, dest) in [
            ("run_start", &mut self.run_start),
            ("run_stop", &mut self.run_stop),
            ("trigger_start", &mut self.trigger_start),
            ("trigger_stop", &mut self.trigger_stop),
        ] {
            if !source.get_double_array(&format!("{VARS_BASE}/{key}"), dest) {
                spdlog::warn!("Variable {}/{} not found, keeping defaults", VARS_BASE, key);
            }
        }
    }
}

impl Default for RunParameters {
    fn default() -> Self {
        RunParameters::new()
    }
}
