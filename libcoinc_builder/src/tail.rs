//! The tail (heavy-ion frontend) event assembler.

use super::constants::*;
use super::detectors::{Dsssd, Ge, HiTof, IonChamber, Mcp, NaI, SurfaceBarrier};
use super::error::DecodeError;
use super::event::{Event, EventHeader};
use super::modules::{AdcModule, FpgaHeader, TdcModule};
use super::nodata::NO_DATA;
use super::variables::{read_bank_tag, tdc_channel_value, TdcVariables, VariableSource};

/// Number of ADC modules on the tail frontend.
pub const TAIL_NUM_ADC: usize = 2;
/// Default TDC channel of the tail trigger.
pub const TAIL_TRIGGER_CH: usize = 60;
/// Default TDC channel capturing the head trigger (crossover).
pub const TAIL_XOVER_CH: usize = 61;

/// Bank tags read by the tail assembler.
#[derive(Debug, Clone)]
pub struct TailBanks {
    pub adc: [[u8; 4]; TAIL_NUM_ADC],
    pub tdc: [u8; 4],
    pub fpga: [u8; 4],
}

impl TailBanks {
    pub fn new() -> Self {
        TailBanks {
            adc: TAIL_ADC_BANKS,
            tdc: TAIL_TDC_BANK,
            fpga: TAIL_FPGA_BANK,
        }
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        read_bank_tag(source, "/Equipment/tail/banks/adc0", &mut self.adc[0]);
        read_bank_tag(source, "/Equipment/tail/banks/adc1", &mut self.adc[1]);
        read_bank_tag(source, "/Equipment/tail/banks/tdc", &mut self.tdc);
        read_bank_tag(source, "/Equipment/tail/banks/fpga", &mut self.fpga);
    }
}

impl Default for TailBanks {
    fn default() -> Self {
        TailBanks::new()
    }
}

/// Tail timing variables: own trigger plus the crossover channel.
#[derive(Debug, Clone)]
pub struct TailVariables {
    pub tdc0: TdcVariables<1>,
    pub xtdc: TdcVariables<1>,
}

impl TailVariables {
    pub fn new() -> Self {
        let mut tdc0 = TdcVariables::new();
        tdc0.channel = [TAIL_TRIGGER_CH];
        let mut xtdc = TdcVariables::new();
        xtdc.channel = [TAIL_XOVER_CH];
        TailVariables { tdc0, xtdc }
    }

    pub fn reset(&mut self) {
        *self = TailVariables::new();
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        self.tdc0.set(source, "/Equipment/tail/variables/tdc0");
        self.xtdc.set(source, "/Equipment/tail/variables/xtdc");
    }
}

impl Default for TailVariables {
    fn default() -> Self {
        TailVariables::new()
    }
}

/// All tail detectors and modules for one event.
#[derive(Debug, Clone, Default)]
pub struct Tail {
    pub banks: TailBanks,
    /// Stream header of the unpacked event.
    pub header: EventHeader,
    /// FPGA trigger header, the authoritative trigger time.
    pub fpga: FpgaHeader,
    pub adc: [AdcModule; TAIL_NUM_ADC],
    pub tdc: TdcModule,
    pub dsssd: Dsssd,
    pub ic: IonChamber,
    pub mcp: Mcp,
    pub sb: SurfaceBarrier,
    pub nai: NaI,
    pub ge: Ge,
    /// Flight times between the tail detectors.
    pub tof: HiTof,
    /// Calibrated own-trigger time.
    pub tcal0: f64,
    /// Calibrated crossover (head trigger) time.
    pub tcalx: f64,
    pub variables: TailVariables,
}

impl Tail {
    pub fn new() -> Self {
        let mut tail = Tail::default();
        tail.reset();
        tail
    }

    pub fn reset(&mut self) {
        self.header = EventHeader::default();
        self.fpga.reset();
        for adc in self.adc.iter_mut() {
            adc.reset();
        }
        self.tdc.reset();
        self.dsssd.reset();
        self.ic.reset();
        self.mcp.reset();
        self.sb.reset();
        self.nai.reset();
        self.ge.reset();
        self.tof.reset();
        self.tcal0 = NO_DATA;
        self.tcalx = NO_DATA;
    }

    /// Load all tail variables from the configuration store.
    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.banks.set(source);
        self.variables.set(source);
        self.dsssd.set_variables(source);
        self.ic.set_variables(source);
        self.mcp.set_variables(source);
        self.sb.set_variables(source);
        self.nai.set_variables(source);
        self.ge.set_variables(source);
    }

    /// Decode the event's banks into the module records.
    pub fn unpack(&mut self, event: &Event) -> Result<(), DecodeError> {
        self.header = event.header;
        self.fpga.unpack(event, &self.banks.fpga)?;
        for (adc, tag) in self.adc.iter_mut().zip(self.banks.adc.iter()) {
            adc.unpack(event, tag)?;
        }
        self.tdc.unpack(event, &self.banks.tdc)?;
        Ok(())
    }

    /// Calibrate all detectors and derive aggregates and trigger times.
    pub fn calculate(&mut self) {
        self.dsssd.read_data(&self.adc, &self.tdc);
        self.dsssd.calculate();
        self.ic.read_data(&self.adc, &self.tdc);
        self.ic.calculate();
        self.mcp.read_data(&self.adc, &self.tdc);
        self.mcp.calculate();
        self.sb.read_data(&self.adc, &self.tdc);
        self.sb.calculate();
        self.nai.read_data(&self.adc, &self.tdc);
        self.nai.calculate();
        self.ge.read_data(&self.adc, &self.tdc);
        self.ge.calculate();
        self.tof.calculate(&self.mcp, &self.dsssd, &self.ic);
        self.tcal0 = tdc_channel_value(&self.tdc, &self.variables.tdc0);
        self.tcalx = tdc_channel_value(&self.tdc, &self.variables.xtdc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodata::is_valid;
    use crate::testutil::tail_event;

    #[test]
    fn unpack_and_calculate() {
        let event = tail_event(55_000, 1);
        let mut tail = Tail::new();
        tail.unpack(&event).unwrap();
        tail.calculate();

        assert!(tail.fpga.valid);
        assert_eq!(tail.fpga.trigger_time, 55_000);
        // The fixture puts the recoil energy in DSSSD strip 6 on ADC 0.
        assert_eq!(tail.dsssd.hit_front, Some(6));
        assert_eq!(tail.dsssd.efront, 1100.0);
        // Second ADC module feeds the second half of the strip map.
        assert_eq!(tail.dsssd.hit_back, None);
        assert_eq!(tail.tcal0, 3000.0);
        assert_eq!(tail.tcalx, 3700.0);
    }

    #[test]
    fn second_adc_module_is_addressable() {
        let event = tail_event(55_000, 1);
        let mut tail = Tail::new();
        // Remap DSSSD strip 0 onto ADC module 1, channel 2.
        tail.dsssd.variables.adc.module[0] = 1;
        tail.dsssd.variables.adc.channel[0] = 2;
        tail.unpack(&event).unwrap();
        tail.calculate();
        assert_eq!(tail.dsssd.ecal[0], 432.0);
    }

    #[test]
    fn missing_banks_leave_sentinels() {
        let event = crate::event::PayloadBuilder::new().into_event(TAIL_EVENT, 0);
        let mut tail = Tail::new();
        tail.unpack(&event).unwrap();
        tail.calculate();
        assert!(!tail.fpga.valid);
        assert!(tail.dsssd.hit_front.is_none());
        assert!(!is_valid(tail.tof.mcp));
        assert!(!is_valid(tail.ge.ecal));
    }
}
