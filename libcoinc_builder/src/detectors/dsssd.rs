use crate::modules::{AdcModule, TdcModule};
use crate::nodata::{max_valid, NO_DATA};
use crate::variables::{
    calibrate_adc, calibrate_tdc, read_adc, read_tdc, AdcVariables, TdcVariables, VariableSource,
};

/// Number of strips (16 front + 16 back).
pub const DSSSD_CHANNELS: usize = 32;
/// First back strip.
const BACK_START: usize = DSSSD_CHANNELS / 2;

const VARS_BASE: &str = "/Equipment/tail/dsssd/variables";

#[derive(Debug, Clone, Default)]
pub struct DsssdVariables {
    pub adc: AdcVariables<DSSSD_CHANNELS>,
    pub tdc: TdcVariables<1>,
}

impl DsssdVariables {
    pub fn reset(&mut self) {
        self.adc.reset();
        self.tdc.reset();
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        self.adc.set(source, &format!("{VARS_BASE}/adc"));
        self.tdc.set(source, &format!("{VARS_BASE}/tdc"));
    }
}

/// Double-sided silicon strip detector.
#[derive(Debug, Clone)]
pub struct Dsssd {
    /// Calibrated strip energies.
    pub ecal: [f64; DSSSD_CHANNELS],
    /// Highest energy in the front strips (0..16).
    pub efront: f64,
    /// Highest energy in the back strips (16..32).
    pub eback: f64,
    /// Front strip that carried `efront`.
    pub hit_front: Option<usize>,
    /// Back strip that carried `eback`.
    pub hit_back: Option<usize>,
    /// Calibrated time.
    pub tcal: f64,
    pub variables: DsssdVariables,
}

impl Dsssd {
    pub fn new() -> Self {
        Dsssd {
            ecal: [NO_DATA; DSSSD_CHANNELS],
            efront: NO_DATA,
            eback: NO_DATA,
            hit_front: None,
            hit_back: None,
            tcal: NO_DATA,
            variables: DsssdVariables::default(),
        }
    }

    pub fn reset(&mut self) {
        self.ecal = [NO_DATA; DSSSD_CHANNELS];
        self.efront = NO_DATA;
        self.eback = NO_DATA;
        self.hit_front = None;
        self.hit_back = None;
        self.tcal = NO_DATA;
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables.set(source);
    }

    pub fn read_data(&mut self, adcs: &[AdcModule], tdc: &TdcModule) {
        read_adc(&mut self.ecal, adcs, &self.variables.adc);
        let mut t = [NO_DATA; 1];
        read_tdc(&mut t, tdc, &self.variables.tdc);
        self.tcal = t[0];
    }

    pub fn calculate(&mut self) {
        calibrate_adc(&mut self.ecal, &self.variables.adc);
        let mut t = [self.tcal];
        calibrate_tdc(&mut t, &self.variables.tdc);
        self.tcal = t[0];

        if let Some((hit, e)) = max_valid(&self.ecal[..BACK_START]) {
            self.hit_front = Some(hit);
            self.efront = e;
        }
        if let Some((hit, e)) = max_valid(&self.ecal[BACK_START..]) {
            self.hit_back = Some(BACK_START + hit);
            self.eback = e;
        }
    }
}

impl Default for Dsssd {
    fn default() -> Self {
        Dsssd::new()
    }
}
