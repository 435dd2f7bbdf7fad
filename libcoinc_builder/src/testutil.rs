//! Shared event fixtures for the unit tests.

use crate::constants::*;
use crate::event::{Event, PayloadBuilder};
use crate::head::{HEAD_TRIGGER_CH, HEAD_XOVER_CH};
use crate::modules::{
    adc_data_word, adc_eob_word, adc_header_word, tdc_measurement_word, tdc_trailer_word,
    FpgaHeader,
};
use crate::scaler::SCALER_CHANNELS;
use crate::tail::{TAIL_TRIGGER_CH, TAIL_XOVER_CH};

fn fpga_words(trigger_time: u64, serial: u32) -> [u32; crate::modules::FPGA_BANK_WORDS] {
    FpgaHeader {
        version: 1,
        trigger_count: serial,
        trigger_time,
        read_time: 10,
        valid: true,
    }
    .to_words()
}

/// A head singles event: two BGO hits plus trigger and crossover times.
pub fn head_event(trigger_time: u64, serial: u32) -> Event {
    PayloadBuilder::new()
        .bank_u32(&HEAD_FPGA_BANK, &fpga_words(trigger_time, serial))
        .bank_u32(
            &HEAD_ADC_BANK,
            &[
                adc_header_word(2),
                adc_data_word(0, 800, false, false),
                adc_data_word(4, 300, false, false),
                adc_eob_word(serial),
            ],
        )
        .bank_u32(
            &HEAD_TDC_BANK,
            &[
                tdc_measurement_word(false, 0, 1500),
                tdc_measurement_word(false, HEAD_TRIGGER_CH as u32, 2000),
                tdc_measurement_word(false, HEAD_XOVER_CH as u32, 2600),
                tdc_trailer_word(3),
            ],
        )
        .into_event(HEAD_EVENT, serial)
}

/// A tail singles event: one DSSSD strip, a second-module sample, times.
pub fn tail_event(trigger_time: u64, serial: u32) -> Event {
    PayloadBuilder::new()
        .bank_u32(&TAIL_FPGA_BANK, &fpga_words(trigger_time, serial))
        .bank_u32(
            &TAIL_ADC_BANKS[0],
            &[
                adc_header_word(1),
                adc_data_word(6, 1100, false, false),
                adc_eob_word(serial),
            ],
        )
        .bank_u32(
            &TAIL_ADC_BANKS[1],
            &[
                adc_header_word(1),
                adc_data_word(2, 432, false, false),
                adc_eob_word(serial),
            ],
        )
        .bank_u32(
            &TAIL_TDC_BANK,
            &[
                tdc_measurement_word(false, 0, 2500),
                tdc_measurement_word(false, TAIL_TRIGGER_CH as u32, 3000),
                tdc_measurement_word(false, TAIL_XOVER_CH as u32, 3700),
                tdc_trailer_word(3),
            ],
        )
        .into_event(TAIL_EVENT, serial)
}

/// A scaler event with the given counts and read period.
pub fn scaler_event(event_id: u16, counts: &[u32; SCALER_CHANNELS], period_us: u32) -> Event {
    PayloadBuilder::new()
        .bank_u32(&SCALER_COUNT_BANK, counts)
        .bank_u32(&SCALER_HEADER_BANK, &[period_us])
        .into_event(event_id, 0)
}
