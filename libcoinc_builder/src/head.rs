//! The head (gamma frontend) event assembler.

use super::constants::*;
use super::detectors::Bgo;
use super::error::DecodeError;
use super::event::{Event, EventHeader};
use super::modules::{AdcModule, FpgaHeader, TdcModule};
use super::nodata::NO_DATA;
use super::variables::{read_bank_tag, tdc_channel_value, TdcVariables, VariableSource};

/// Default TDC channel of the head trigger.
pub const HEAD_TRIGGER_CH: usize = 60;
/// Default TDC channel capturing the tail trigger (crossover).
pub const HEAD_XOVER_CH: usize = 61;

/// Bank tags read by the head assembler.
#[derive(Debug, Clone)]
pub struct HeadBanks {
    pub adc: [u8; 4],
    pub tdc: [u8; 4],
    pub fpga: [u8; 4],
}

impl HeadBanks {
    pub fn new() -> Self {
        HeadBanks {
            adc: HEAD_ADC_BANK,
            tdc: HEAD_TDC_BANK,
            fpga: HEAD_FPGA_BANK,
        }
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        read_bank_tag(source, "/Equipment/head/banks/adc", &mut self.adc);
        read_bank_tag(source, "/Equipment/head/banks/tdc", &mut self.tdc);
        read_bank_tag(source, "/Equipment/head/banks/fpga", &mut self.fpga);
    }
}

impl Default for HeadBanks {
    fn default() -> Self {
        HeadBanks::new()
    }
}

/// Head timing variables: own trigger plus the crossover channel.
#[derive(Debug, Clone)]
pub struct HeadVariables {
    pub tdc0: TdcVariables<1>,
    pub xtdc: TdcVariables<1>,
}

impl HeadVariables {
    pub fn new() -> Self {
        let mut tdc0 = TdcVariables::new();
        tdc0.channel = [HEAD_TRIGGER_CH];
        let mut xtdc = TdcVariables::new();
        xtdc.channel = [HEAD_XOVER_CH];
        HeadVariables { tdc0, xtdc }
    }

    pub fn reset(&mut self) {
        *self = HeadVariables::new();
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        self.tdc0.set(source, "/Equipment/head/variables/tdc0");
        self.xtdc.set(source, "/Equipment/head/variables/xtdc");
    }
}

impl Default for HeadVariables {
    fn default() -> Self {
        HeadVariables::new()
    }
}

/// All head detectors and modules for one event.
#[derive(Debug, Clone, Default)]
pub struct Head {
    pub banks: HeadBanks,
    /// Stream header of the unpacked event.
    pub header: EventHeader,
    /// FPGA trigger header, the authoritative trigger time.
    pub fpga: FpgaHeader,
    pub adc: AdcModule,
    pub tdc: TdcModule,
    /// The gamma array.
    pub bgo: Bgo,
    /// Calibrated own-trigger time.
    pub tcal0: f64,
    /// Calibrated crossover (tail trigger) time.
    pub tcalx: f64,
    pub variables: HeadVariables,
}

impl Head {
    pub fn new() -> Self {
        let mut head = Head::default();
        head.reset();
        head
    }

    pub fn reset(&mut self) {
        self.header = EventHeader::default();
        self.fpga.reset();
        self.adc.reset();
        self.tdc.reset();
        self.bgo.reset();
        self.tcal0 = NO_DATA;
        self.tcalx = NO_DATA;
    }

    /// Load all head variables from the configuration store.
    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.banks.set(source);
        self.variables.set(source);
        self.bgo.set_variables(source);
    }

    /// Decode the event's banks into the module records.
    pub fn unpack(&mut self, event: &Event) -> Result<(), DecodeError> {
        self.header = event.header;
        self.fpga.unpack(event, &self.banks.fpga)?;
        self.adc.unpack(event, &self.banks.adc)?;
        self.tdc.unpack(event, &self.banks.tdc)?;
        Ok(())
    }

    /// Calibrate all detectors and derive the trigger times.
    pub fn calculate(&mut self) {
        self.bgo.read_data(std::slice::from_ref(&self.adc), &self.tdc);
        self.bgo.calculate();
        self.tcal0 = tdc_channel_value(&self.tdc, &self.variables.tdc0);
        self.tcalx = tdc_channel_value(&self.tdc, &self.variables.xtdc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PayloadBuilder;
    use crate::nodata::is_valid;
    use crate::testutil::head_event;

    #[test]
    fn unpack_and_calculate() {
        let event = head_event(123_456, 3);
        let mut head = Head::new();
        head.reset();
        head.unpack(&event).unwrap();
        head.calculate();

        assert!(head.fpga.valid);
        assert_eq!(head.fpga.trigger_time, 123_456);
        assert_eq!(head.header.serial, 3);
        assert_eq!(head.bgo.ecal[0], 800.0);
        assert_eq!(head.bgo.ecal[4], 300.0);
        assert_eq!(head.bgo.hit0, Some(0));
        assert_eq!(head.bgo.tcal[0], 1500.0);
        assert_eq!(head.tcal0, 2000.0);
        assert_eq!(head.tcalx, 2600.0);
    }

    #[test]
    fn missing_banks_leave_sentinels() {
        let event = PayloadBuilder::new().into_event(HEAD_EVENT, 0);
        let mut head = Head::new();
        head.unpack(&event).unwrap();
        head.calculate();

        assert!(!head.fpga.valid);
        assert!(!head.adc.valid);
        assert!(head.bgo.ecal.iter().all(|v| v.is_nan()));
        assert!(!is_valid(head.tcal0));
    }

    #[test]
    fn reset_clears_previous_event() {
        let mut head = Head::new();
        head.unpack(&head_event(99, 1)).unwrap();
        head.calculate();
        head.reset();
        assert!(!head.fpga.valid);
        assert!(!is_valid(head.tcal0));
        assert!(head.bgo.hit0.is_none());
    }
}
