//! Hardware module decoders: multi-channel ADCs, the multi-hit TDC, and the
//! FPGA trigger header.
//!
//! Each decoder follows the same contract: a missing bank leaves the module
//! at sentinel values with `valid == false` (downstream sees "no data"); a
//! present but malformed bank is a [`DecodeError`] that fails the event.

use super::constants::*;
use super::error::DecodeError;
use super::event::Event;
use super::nodata::{ADC_NONE, TDC_NONE};

/// Channels per ADC module.
pub const ADC_CHANNELS: usize = 32;
/// Channels per TDC module.
pub const TDC_CHANNELS: usize = 64;
/// Exact word count of an FPGA header bank.
pub const FPGA_BANK_WORDS: usize = 5;

// ADC word types live in bits 26..24.
const ADC_TYPE_SHIFT: u32 = 24;
const ADC_TYPE_MASK: u32 = 0x7;
const ADC_TYPE_HEADER: u32 = 0b010;
const ADC_TYPE_DATA: u32 = 0b000;
const ADC_TYPE_EOB: u32 = 0b100;

// TDC word types live in bits 31..27.
const TDC_TYPE_SHIFT: u32 = 27;
const TDC_TYPE_DATA: u32 = 0x00;
const TDC_TYPE_TRAILER: u32 = 0x10;
const TDC_TRAILING_BIT: u32 = 1 << 26;

/// Encode an ADC header word carrying the hit-channel count.
pub fn adc_header_word(count: u32) -> u32 {
    (ADC_TYPE_HEADER << ADC_TYPE_SHIFT) | ((count & 0x3f) << 8)
}

/// Encode an ADC datum word.
pub fn adc_data_word(channel: u32, value: u16, overflow: bool, underflow: bool) -> u32 {
    (ADC_TYPE_DATA << ADC_TYPE_SHIFT)
        | ((channel & 0x1f) << 16)
        | ((underflow as u32) << 13)
        | ((overflow as u32) << 12)
        | (value as u32 & 0x0fff)
}

/// Encode an ADC end-of-block word carrying the event counter.
pub fn adc_eob_word(event_counter: u32) -> u32 {
    (ADC_TYPE_EOB << ADC_TYPE_SHIFT) | (event_counter & 0x00ff_ffff)
}

/// Encode a TDC measurement word.
pub fn tdc_measurement_word(trailing: bool, channel: u32, time: u32) -> u32 {
    (TDC_TYPE_DATA << TDC_TYPE_SHIFT)
        | ((trailing as u32) << 26)
        | ((channel & 0x7f) << 19)
        | (time & 0x7_ffff)
}

/// Encode a TDC trailer word.
pub fn tdc_trailer_word(word_count: u32) -> u32 {
    (TDC_TYPE_TRAILER << TDC_TYPE_SHIFT) | (word_count & 0x00ff_ffff)
}

/// A 32-channel peak-sensing ADC.
///
/// The bank is sparse: only converted channels appear in the payload, so
/// every other channel stays at the raw sentinel.
#[derive(Debug, Clone)]
pub struct AdcModule {
    /// Raw samples indexed by channel.
    pub data: [i16; ADC_CHANNELS],
    /// Per-channel overflow flags.
    pub overflow: [bool; ADC_CHANNELS],
    /// Per-channel underflow flags.
    pub underflow: [bool; ADC_CHANNELS],
    /// Event counter from the end-of-block word.
    pub event_counter: u32,
    /// True once a bank was decoded for this event.
    pub valid: bool,
}

impl AdcModule {
    pub fn new() -> Self {
        AdcModule {
            data: [ADC_NONE; ADC_CHANNELS],
            overflow: [false; ADC_CHANNELS],
            underflow: [false; ADC_CHANNELS],
            event_counter: 0,
            valid: false,
        }
    }

    pub fn reset(&mut self) {
        *self = AdcModule::new();
    }

    /// Raw sample for a channel; out-of-range channels read as the sentinel.
    pub fn get_data(&self, ch: usize) -> i16 {
        if ch < ADC_CHANNELS {
            self.data[ch]
        } else {
            ADC_NONE
        }
    }

    /// Decode the bank with the given tag, if present.
    pub fn unpack(&mut self, event: &Event, tag: &[u8; 4]) -> Result<(), DecodeError> {
        let bank = match event.bank(tag)? {
            Some(b) => b,
            None => return Ok(()),
        };
        let words = bank.u32s()?;
        let (&first, rest) = words
            .split_first()
            .ok_or(DecodeError::AdcMissingHeader(0))?;
        if (first >> ADC_TYPE_SHIFT) & ADC_TYPE_MASK != ADC_TYPE_HEADER {
            return Err(DecodeError::AdcMissingHeader(first));
        }
        let (&last, data) = rest.split_last().ok_or(DecodeError::AdcMissingEob)?;
        if (last >> ADC_TYPE_SHIFT) & ADC_TYPE_MASK != ADC_TYPE_EOB {
            return Err(DecodeError::AdcMissingEob);
        }
        self.event_counter = last & 0x00ff_ffff;
        for &word in data {
            if (word >> ADC_TYPE_SHIFT) & ADC_TYPE_MASK != ADC_TYPE_DATA {
                return Err(DecodeError::AdcBadWord(word));
            }
            let ch = (word >> 16) & 0x1f;
            if ch as usize >= ADC_CHANNELS {
                return Err(DecodeError::AdcBadChannel(ch));
            }
            self.data[ch as usize] = (word & 0x0fff) as i16;
            self.overflow[ch as usize] = word & (1 << 12) != 0;
            self.underflow[ch as usize] = word & (1 << 13) != 0;
        }
        self.valid = true;
        Ok(())
    }
}

impl Default for AdcModule {
    fn default() -> Self {
        AdcModule::new()
    }
}

/// A 64-channel multi-hit TDC.
///
/// Only the first leading-edge hit per channel is kept; later hits are
/// counted and discarded, trailing edges are ignored outright.
#[derive(Debug, Clone)]
pub struct TdcModule {
    /// First leading-edge time per channel, in ticks.
    pub leading: [i32; TDC_CHANNELS],
    /// Leading-edge hits seen per channel, kept hits included.
    pub nhits: [u16; TDC_CHANNELS],
    /// True once a bank was decoded for this event.
    pub valid: bool,
}

impl TdcModule {
    pub fn new() -> Self {
        TdcModule {
            leading: [TDC_NONE; TDC_CHANNELS],
            nhits: [0; TDC_CHANNELS],
            valid: false,
        }
    }

    pub fn reset(&mut self) {
        *self = TdcModule::new();
    }

    /// Leading-edge time for a channel; out-of-range reads as the sentinel.
    pub fn get_leading(&self, ch: usize) -> i32 {
        if ch < TDC_CHANNELS {
            self.leading[ch]
        } else {
            TDC_NONE
        }
    }

    /// Total hits dropped by the first-hit-wins policy.
    pub fn extra_hits(&self) -> u32 {
        self.nhits
            .iter()
            .map(|&n| u32::from(n.saturating_sub(1)))
            .sum()
    }

    /// Decode the bank with the given tag, if present.
    pub fn unpack(&mut self, event: &Event, tag: &[u8; 4]) -> Result<(), DecodeError> {
        let bank = match event.bank(tag)? {
            Some(b) => b,
            None => return Ok(()),
        };
        let words = bank.u32s()?;
        let mut closed = false;
        for &word in &words {
            match word >> TDC_TYPE_SHIFT {
                TDC_TYPE_DATA => {
                    if word & TDC_TRAILING_BIT != 0 {
                        continue;
                    }
                    let ch = (word >> 19) & 0x7f;
                    if ch as usize >= TDC_CHANNELS {
                        return Err(DecodeError::TdcBadChannel(ch));
                    }
                    let ch = ch as usize;
                    self.nhits[ch] = self.nhits[ch].saturating_add(1);
                    if self.leading[ch] == TDC_NONE {
                        self.leading[ch] = (word & 0x7_ffff) as i32;
                    }
                }
                TDC_TYPE_TRAILER => {
                    closed = true;
                    break;
                }
                _ => return Err(DecodeError::TdcBadWord(word)),
            }
        }
        if !closed {
            return Err(DecodeError::TdcMissingTrailer);
        }
        self.valid = true;
        Ok(())
    }
}

impl Default for TdcModule {
    fn default() -> Self {
        TdcModule::new()
    }
}

/// The FPGA trigger header: authoritative source of the event's trigger
/// timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct FpgaHeader {
    pub version: u32,
    pub trigger_count: u32,
    /// Trigger timestamp in ticks of [`CLOCK_HZ`](super::constants::CLOCK_HZ).
    pub trigger_time: u64,
    pub read_time: u32,
    pub valid: bool,
}

impl FpgaHeader {
    pub fn new() -> Self {
        FpgaHeader::default()
    }

    pub fn reset(&mut self) {
        *self = FpgaHeader::default();
    }

    /// Decode the bank with the given tag, if present.
    pub fn unpack(&mut self, event: &Event, tag: &[u8; 4]) -> Result<(), DecodeError> {
        let bank = match event.bank(tag)? {
            Some(b) => b,
            None => return Ok(()),
        };
        let words = bank.u32s()?;
        if words.len() != FPGA_BANK_WORDS {
            return Err(DecodeError::FpgaHeaderSize(words.len()));
        }
        self.version = words[0];
        self.trigger_count = words[1];
        self.trigger_time = words[2] as u64 | (words[3] as u64) << 32;
        self.read_time = words[4];
        self.valid = true;
        Ok(())
    }

    /// Encode the header's bank words (writing half, for stream generators).
    pub fn to_words(&self) -> [u32; FPGA_BANK_WORDS] {
        [
            self.version,
            self.trigger_count,
            self.trigger_time as u32,
            (self.trigger_time >> 32) as u32,
            self.read_time,
        ]
    }
}

/// Extract an event's trigger timestamp from its FPGA header bank.
///
/// Singles events (head/tail) must carry one; everything else reads as
/// `None` without touching the payload.
pub fn trigger_time(event: &Event) -> Result<Option<u64>, DecodeError> {
    let tag = match event.header.event_id {
        HEAD_EVENT => HEAD_FPGA_BANK,
        TAIL_EVENT => TAIL_FPGA_BANK,
        _ => return Ok(None),
    };
    let mut fpga = FpgaHeader::new();
    fpga.unpack(event, &tag)?;
    if fpga.valid {
        Ok(Some(fpga.trigger_time))
    } else {
        Err(DecodeError::NoTriggerTime(event.header.serial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PayloadBuilder;

    fn adc_bank(hits: &[(u32, u16, bool, bool)]) -> Vec<u32> {
        let mut words = vec![adc_header_word(hits.len() as u32)];
        for &(ch, value, over, under) in hits {
            words.push(adc_data_word(ch, value, over, under));
        }
        words.push(adc_eob_word(1));
        words
    }

    #[test]
    fn adc_sparse_channels_stay_sentinel() {
        let event = PayloadBuilder::new()
            .bank_u32(b"VADC", &adc_bank(&[(0, 100, false, false), (5, 2000, true, false)]))
            .into_event(HEAD_EVENT, 0);
        let mut adc = AdcModule::new();
        adc.unpack(&event, b"VADC").unwrap();
        assert!(adc.valid);
        assert_eq!(adc.data[0], 100);
        assert_eq!(adc.data[5], 2000);
        assert!(adc.overflow[5]);
        assert_eq!(adc.data[7], ADC_NONE);
        assert_eq!(adc.get_data(99), ADC_NONE);
    }

    #[test]
    fn adc_missing_bank_is_not_an_error() {
        let event = PayloadBuilder::new().into_event(HEAD_EVENT, 0);
        let mut adc = AdcModule::new();
        adc.unpack(&event, b"VADC").unwrap();
        assert!(!adc.valid);
        assert!(adc.data.iter().all(|&d| d == ADC_NONE));
    }

    #[test]
    fn adc_requires_header_and_eob() {
        let event = PayloadBuilder::new()
            .bank_u32(b"VADC", &[adc_data_word(0, 1, false, false)])
            .into_event(HEAD_EVENT, 0);
        let mut adc = AdcModule::new();
        assert!(matches!(
            adc.unpack(&event, b"VADC"),
            Err(DecodeError::AdcMissingHeader(_))
        ));

        let event = PayloadBuilder::new()
            .bank_u32(
                b"VADC",
                &[adc_header_word(1), adc_data_word(0, 1, false, false)],
            )
            .into_event(HEAD_EVENT, 0);
        let mut adc = AdcModule::new();
        assert!(matches!(
            adc.unpack(&event, b"VADC"),
            Err(DecodeError::AdcMissingEob)
        ));
    }

    #[test]
    fn tdc_keeps_first_leading_hit() {
        let words = [
            tdc_measurement_word(false, 3, 1000),
            tdc_measurement_word(true, 3, 1100), // trailing edge, ignored
            tdc_measurement_word(false, 3, 1200), // extra hit, counted only
            tdc_measurement_word(false, 60, 77),
            tdc_trailer_word(4),
        ];
        let event = PayloadBuilder::new()
            .bank_u32(b"VTDC", &words)
            .into_event(HEAD_EVENT, 0);
        let mut tdc = TdcModule::new();
        tdc.unpack(&event, b"VTDC").unwrap();
        assert_eq!(tdc.leading[3], 1000);
        assert_eq!(tdc.nhits[3], 2);
        assert_eq!(tdc.leading[60], 77);
        assert_eq!(tdc.extra_hits(), 1);
        assert_eq!(tdc.get_leading(10), TDC_NONE);
    }

    #[test]
    fn tdc_requires_trailer() {
        let event = PayloadBuilder::new()
            .bank_u32(b"VTDC", &[tdc_measurement_word(false, 0, 1)])
            .into_event(HEAD_EVENT, 0);
        let mut tdc = TdcModule::new();
        assert!(matches!(
            tdc.unpack(&event, b"VTDC"),
            Err(DecodeError::TdcMissingTrailer)
        ));
    }

    #[test]
    fn fpga_header_reassembles_64_bit_time() {
        let mut fpga = FpgaHeader {
            version: 3,
            trigger_count: 12,
            trigger_time: 0x0123_4567_89ab_cdef,
            read_time: 99,
            valid: true,
        };
        let event = PayloadBuilder::new()
            .bank_u32(b"VTRG", &fpga.to_words())
            .into_event(HEAD_EVENT, 0);
        fpga.reset();
        fpga.unpack(&event, b"VTRG").unwrap();
        assert!(fpga.valid);
        assert_eq!(fpga.trigger_time, 0x0123_4567_89ab_cdef);
        assert_eq!(fpga.trigger_count, 12);
    }

    #[test]
    fn trigger_time_lookup() {
        let fpga = FpgaHeader {
            trigger_time: 5555,
            ..Default::default()
        };
        let event = PayloadBuilder::new()
            .bank_u32(b"VTRG", &fpga.to_words())
            .into_event(HEAD_EVENT, 0);
        assert_eq!(trigger_time(&event).unwrap(), Some(5555));

        // A singles event without the bank is a decode error.
        let bare = PayloadBuilder::new().into_event(HEAD_EVENT, 7);
        assert!(matches!(
            trigger_time(&bare),
            Err(DecodeError::NoTriggerTime(7))
        ));

        // Scalers never carry one.
        let scaler = PayloadBuilder::new().into_event(HEAD_SCALER, 0);
        assert_eq!(trigger_time(&scaler).unwrap(), None);
    }
}
