//! The coincidence event builder: one matched head + tail pair.

use super::constants::tick_diff_to_us;
use super::error::DecodeError;
use super::event::Event;
use super::head::Head;
use super::nodata::NO_DATA;
use super::tail::Tail;
use super::variables::VariableSource;

/// A complete coincidence event.
#[derive(Debug, Clone, Default)]
pub struct Coinc {
    /// Gamma-ray half of the event.
    pub head: Head,
    /// Heavy-ion half of the event.
    pub tail: Tail,
    /// Tail minus head FPGA trigger times, microseconds. Negative when the
    /// tail triggered first.
    pub xtrig: f64,
    /// Crossover time-of-flight measured in the head TDC.
    pub xtofh: f64,
    /// Crossover time-of-flight measured in the tail TDC.
    pub xtoft: f64,
}

impl Coinc {
    pub fn new() -> Self {
        let mut coinc = Coinc::default();
        coinc.reset();
        coinc
    }

    pub fn reset(&mut self) {
        self.head.reset();
        self.tail.reset();
        self.xtrig = NO_DATA;
        self.xtofh = NO_DATA;
        self.xtoft = NO_DATA;
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.head.set_variables(source);
        self.tail.set_variables(source);
    }

    /// Unpack both halves from their raw events.
    pub fn unpack(&mut self, head_event: &Event, tail_event: &Event) -> Result<(), DecodeError> {
        self.reset();
        self.head.unpack(head_event)?;
        self.tail.unpack(tail_event)?;
        Ok(())
    }

    /// Calculate both singles sides, then the cross-detector observables.
    pub fn calculate(&mut self) {
        self.head.calculate();
        self.tail.calculate();

        if self.head.fpga.valid && self.tail.fpga.valid {
            self.xtrig = tick_diff_to_us(
                self.tail.fpga.trigger_time as i64 - self.head.fpga.trigger_time as i64,
            );
        }
        self.xtofh = self.head.tcalx - self.head.tcal0;
        self.xtoft = self.tail.tcalx - self.tail.tcal0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodata::is_valid;
    use crate::testutil::{head_event, tail_event};

    #[test]
    fn cross_observables() {
        let he = head_event(100_000, 0);
        let te = tail_event(104_000, 0);
        let mut coinc = Coinc::new();
        coinc.unpack(&he, &te).unwrap();
        coinc.calculate();

        // 4000 ns between the triggers.
        assert!((coinc.xtrig - 4.0).abs() < 1e-12);
        // Fixture times: head crossover 2600 - trigger 2000.
        assert_eq!(coinc.xtofh, 600.0);
        // Tail crossover 3700 - trigger 3000.
        assert_eq!(coinc.xtoft, 700.0);
        // Both singles halves were fully computed.
        assert_eq!(coinc.head.bgo.hit0, Some(0));
        assert_eq!(coinc.tail.dsssd.hit_front, Some(6));
    }

    #[test]
    fn negative_trigger_delta() {
        let he = head_event(500_000, 0);
        let te = tail_event(200_000, 0);
        let mut coinc = Coinc::new();
        coinc.unpack(&he, &te).unwrap();
        coinc.calculate();
        assert!((coinc.xtrig + 300.0).abs() < 1e-12);
    }

    #[test]
    fn missing_fpga_leaves_xtrig_sentinel() {
        let he = crate::event::PayloadBuilder::new().into_event(crate::constants::HEAD_EVENT, 0);
        let te = tail_event(200_000, 0);
        let mut coinc = Coinc::new();
        coinc.unpack(&he, &te).unwrap();
        coinc.calculate();
        assert!(!is_valid(coinc.xtrig));
    }
}
