use crate::modules::{AdcModule, TdcModule};
use crate::nodata::{sum_valid, NO_DATA};
use crate::variables::{
    calibrate_adc, calibrate_tdc, read_adc, read_tdc, AdcVariables, TdcVariables, VariableSource,
};

/// Number of anodes.
pub const IC_CHANNELS: usize = 4;

const VARS_BASE: &str = "/Equipment/tail/ic/variables";

#[derive(Debug, Clone, Default)]
pub struct IonChamberVariables {
    pub adc: AdcVariables<IC_CHANNELS>,
    pub tdc: TdcVariables<1>,
}

impl IonChamberVariables {
    pub fn reset(&mut self) {
        self.adc.reset();
        self.tdc.reset();
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        self.adc.set(source, &format!("{VARS_BASE}/adc"));
        self.tdc.set(source, &format!("{VARS_BASE}/tdc"));
    }
}

/// Ionization chamber.
#[derive(Debug, Clone)]
pub struct IonChamber {
    /// Calibrated anode signals.
    pub anode: [f64; IC_CHANNELS],
    /// Calibrated time.
    pub tcal: f64,
    /// Sum of valid anode signals.
    pub sum: f64,
    pub variables: IonChamberVariables,
}

impl IonChamber {
    pub fn new() -> Self {
        IonChamber {
            anode: [NO_DATA; IC_CHANNELS],
            tcal: NO_DATA,
            sum: NO_DATA,
            variables: IonChamberVariables::default(),
        }
    }

    pub fn reset(&mut self) {
        self.anode = [NO_DATA; IC_CHANNELS];
        self.tcal = NO_DATA;
        self.sum = NO_DATA;
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables.set(source);
    }

    pub fn read_data(&mut self, adcs: &[AdcModule], tdc: &TdcModule) {
        read_adc(&mut self.anode, adcs, &self.variables.adc);
        let mut t = [NO_DATA; 1];
        read_tdc(&mut t, tdc, &self.variables.tdc);
        self.tcal = t[0];
    }

    pub fn calculate(&mut self) {
        calibrate_adc(&mut self.anode, &self.variables.adc);
        let mut t = [self.tcal];
        calibrate_tdc(&mut t, &self.variables.tdc);
        self.tcal = t[0];
        self.sum = sum_valid(&self.anode);
    }
}

impl Default for IonChamber {
    fn default() -> Self {
        IonChamber::new()
    }
}
