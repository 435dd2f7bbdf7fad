use crate::modules::{AdcModule, TdcModule};
use crate::nodata::{max_valid, sort_descending, sum_valid, NO_DATA};
use crate::variables::{
    calibrate_adc, calibrate_tdc, read_adc, read_tdc, AdcVariables, PositionVariables,
    TdcVariables, VariableSource,
};

/// Number of crystals in the gamma array.
pub const BGO_CHANNELS: usize = 30;

const VARS_BASE: &str = "/Equipment/head/bgo/variables";

#[derive(Debug, Clone, Default)]
pub struct BgoVariables {
    pub adc: AdcVariables<BGO_CHANNELS>,
    pub tdc: TdcVariables<BGO_CHANNELS>,
    pub pos: PositionVariables<BGO_CHANNELS>,
}

impl BgoVariables {
    pub fn reset(&mut self) {
        self.adc.reset();
        self.tdc.reset();
        self.pos.reset();
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        self.adc.set(source, &format!("{VARS_BASE}/adc"));
        self.tdc.set(source, &format!("{VARS_BASE}/tdc"));
        self.pos.set(source, &format!("{VARS_BASE}/pos"));
    }
}

/// The gamma-ray scintillator array.
#[derive(Debug, Clone)]
pub struct Bgo {
    /// Calibrated energies (raw samples between read_data and calculate).
    pub ecal: [f64; BGO_CHANNELS],
    /// Calibrated times.
    pub tcal: [f64; BGO_CHANNELS],
    /// Energies sorted high to low, sentinels last.
    pub esort: [f64; BGO_CHANNELS],
    /// Sum of all valid energies.
    pub sum: f64,
    /// Crystal with the highest energy hit, if any channel fired.
    pub hit0: Option<usize>,
    /// x position of the highest energy hit.
    pub x0: f64,
    /// y position of the highest energy hit.
    pub y0: f64,
    /// z position of the highest energy hit.
    pub z0: f64,
    /// Time of the highest energy hit.
    pub t0: f64,
    pub variables: BgoVariables,
}

impl Bgo {
    pub fn new() -> Self {
        let mut bgo = Bgo {
            ecal: [NO_DATA; BGO_CHANNELS],
            tcal: [NO_DATA; BGO_CHANNELS],
            esort: [NO_DATA; BGO_CHANNELS],
            sum: NO_DATA,
            hit0: None,
            x0: NO_DATA,
            y0: NO_DATA,
            z0: NO_DATA,
            t0: NO_DATA,
            variables: BgoVariables::default(),
        };
        bgo.reset();
        bgo
    }

    pub fn reset(&mut self) {
        self.ecal = [NO_DATA; BGO_CHANNELS];
        self.tcal = [NO_DATA; BGO_CHANNELS];
        self.esort = [NO_DATA; BGO_CHANNELS];
        self.sum = NO_DATA;
        self.hit0 = None;
        self.x0 = NO_DATA;
        self.y0 = NO_DATA;
        self.z0 = NO_DATA;
        self.t0 = NO_DATA;
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables.set(source);
    }

    pub fn read_data(&mut self, adcs: &[AdcModule], tdc: &TdcModule) {
        read_adc(&mut self.ecal, adcs, &self.variables.adc);
        read_tdc(&mut self.tcal, tdc, &self.variables.tdc);
    }

    pub fn calculate(&mut self) {
        calibrate_adc(&mut self.ecal, &self.variables.adc);
        calibrate_tdc(&mut self.tcal, &self.variables.tdc);

        self.esort = self.ecal;
        sort_descending(&mut self.esort);
        self.sum = sum_valid(&self.ecal);

        if let Some((hit, _)) = max_valid(&self.ecal) {
            self.hit0 = Some(hit);
            self.x0 = self.variables.pos.x[hit];
            self.y0 = self.variables.pos.y[hit];
            self.z0 = self.variables.pos.z[hit];
            self.t0 = self.tcal[hit];
        }
    }
}

impl Default for Bgo {
    fn default() -> Self {
        Bgo::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodata::is_valid;

    fn adc_with(samples: &[(usize, i16)]) -> AdcModule {
        let mut adc = AdcModule::new();
        adc.valid = true;
        for &(ch, v) in samples {
            adc.data[ch] = v;
        }
        adc
    }

    #[test]
    fn highest_hit_and_sort() {
        let adc = adc_with(&[(0, 100), (7, 900), (29, 400)]);
        let mut tdc = TdcModule::new();
        tdc.leading[7] = 1234;

        let mut bgo = Bgo::new();
        bgo.variables.pos.x[7] = 1.5;
        bgo.variables.pos.z[7] = -3.0;
        bgo.reset();
        bgo.read_data(std::slice::from_ref(&adc), &tdc);
        bgo.calculate();

        assert_eq!(bgo.hit0, Some(7));
        assert_eq!(bgo.x0, 1.5);
        assert_eq!(bgo.z0, -3.0);
        assert_eq!(bgo.t0, 1234.0);
        assert_eq!(bgo.sum, 1400.0);
        assert_eq!(&bgo.esort[..3], &[900.0, 400.0, 100.0]);
        assert!(bgo.esort[3..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn empty_event_stays_sentinel() {
        let adc = AdcModule::new();
        let tdc = TdcModule::new();
        let mut bgo = Bgo::new();
        bgo.read_data(std::slice::from_ref(&adc), &tdc);
        bgo.calculate();

        assert!(bgo.hit0.is_none());
        assert!(!is_valid(bgo.sum));
        assert!(!is_valid(bgo.x0));
        assert!(bgo.ecal.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn calibration_applies_per_channel() {
        let adc = adc_with(&[(3, 1000)]);
        let tdc = TdcModule::new();
        let mut bgo = Bgo::new();
        bgo.variables.adc.slope[3] = 0.5;
        bgo.variables.adc.pedestal[3] = 100.0;
        bgo.variables.adc.offset[3] = 2.0;
        bgo.read_data(std::slice::from_ref(&adc), &tdc);
        bgo.calculate();
        assert_eq!(bgo.ecal[3], 452.0);
    }
}
