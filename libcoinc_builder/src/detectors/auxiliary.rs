//! Single-purpose energy detectors: surface barriers, NaI, and the Ge.

use crate::modules::{AdcModule, TdcModule};
use crate::nodata::NO_DATA;
use crate::variables::{calibrate_adc, read_adc, AdcVariables, VariableSource};

/// Number of surface barrier detectors.
pub const SB_CHANNELS: usize = 2;
/// Number of NaI detectors.
pub const NAI_CHANNELS: usize = 2;

/// Surface barrier detectors.
#[derive(Debug, Clone)]
pub struct SurfaceBarrier {
    /// Calibrated energy per detector.
    pub ecal: [f64; SB_CHANNELS],
    pub variables: AdcVariables<SB_CHANNELS>,
}

impl SurfaceBarrier {
    pub fn new() -> Self {
        SurfaceBarrier {
            ecal: [NO_DATA; SB_CHANNELS],
            variables: AdcVariables::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ecal = [NO_DATA; SB_CHANNELS];
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables.set(source, "/Equipment/tail/sb/variables/adc");
    }

    pub fn read_data(&mut self, adcs: &[AdcModule], _tdc: &TdcModule) {
        read_adc(&mut self.ecal, adcs, &self.variables);
    }

    pub fn calculate(&mut self) {
        calibrate_adc(&mut self.ecal, &self.variables);
    }
}

impl Default for SurfaceBarrier {
    fn default() -> Self {
        SurfaceBarrier::new()
    }
}

/// Sodium iodide detectors.
#[derive(Debug, Clone)]
pub struct NaI {
    /// Calibrated energy per detector.
    pub ecal: [f64; NAI_CHANNELS],
    pub variables: AdcVariables<NAI_CHANNELS>,
}

impl NaI {
    pub fn new() -> Self {
        NaI {
            ecal: [NO_DATA; NAI_CHANNELS],
            variables: AdcVariables::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ecal = [NO_DATA; NAI_CHANNELS];
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables
            .set(source, "/Equipment/tail/nai/variables/adc");
    }

    pub fn read_data(&mut self, adcs: &[AdcModule], _tdc: &TdcModule) {
        read_adc(&mut self.ecal, adcs, &self.variables);
    }

    pub fn calculate(&mut self) {
        calibrate_adc(&mut self.ecal, &self.variables);
    }
}

impl Default for NaI {
    fn default() -> Self {
        NaI::new()
    }
}

/// Germanium detector.
#[derive(Debug, Clone)]
pub struct Ge {
    /// Calibrated energy.
    pub ecal: f64,
    pub variables: AdcVariables<1>,
}

impl Ge {
    pub fn new() -> Self {
        Ge {
            ecal: NO_DATA,
            variables: AdcVariables::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ecal = NO_DATA;
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables.set(source, "/Equipment/tail/ge/variables/adc");
    }

    pub fn read_data(&mut self, adcs: &[AdcModule], _tdc: &TdcModule) {
        let mut e = [NO_DATA; 1];
        read_adc(&mut e, adcs, &self.variables);
        self.ecal = e[0];
    }

    pub fn calculate(&mut self) {
        let mut e = [self.ecal];
        calibrate_adc(&mut e, &self.variables);
        self.ecal = e[0];
    }
}

impl Default for Ge {
    fn default() -> Self {
        Ge::new()
    }
}
