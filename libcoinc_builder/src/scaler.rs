//! Per-frontend scaler accumulator.

use super::constants::{SCALER_COUNT_BANK, SCALER_HEADER_BANK};
use super::error::DecodeError;
use super::event::Event;
use super::variables::{read_bank_tag, read_string, VariableSource};

/// Counter channels per scaler bank.
pub const SCALER_CHANNELS: usize = 17;

/// Scaler names and bank tags for one frontend.
#[derive(Debug, Clone)]
pub struct ScalerVariables {
    /// Descriptive name per channel.
    pub names: [String; SCALER_CHANNELS],
    pub count_bank: [u8; 4],
    pub header_bank: [u8; 4],
    /// Configuration-store base path, e.g. `/Equipment/head/scaler`.
    pub base_path: String,
}

impl ScalerVariables {
    pub fn new(side: &str) -> Self {
        ScalerVariables {
            names: std::array::from_fn(|i| format!("channel_{i}")),
            count_bank: SCALER_COUNT_BANK,
            header_bank: SCALER_HEADER_BANK,
            base_path: format!("/Equipment/{side}/scaler"),
        }
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        for (i, name) in self.names.iter_mut().enumerate() {
            read_string(source, &format!("{}/variables/names/{i}", self.base_path), name);
        }
        read_bank_tag(
            source,
            &format!("{}/banks/count", self.base_path),
            &mut self.count_bank,
        );
        read_bank_tag(
            source,
            &format!("{}/banks/header", self.base_path),
            &mut self.header_bank,
        );
    }
}

/// Count / running sum / rate for one frontend's counters.
#[derive(Debug, Clone)]
pub struct Scaler {
    /// Counts in the latest read period.
    pub count: [u32; SCALER_CHANNELS],
    /// Counts accumulated over the run.
    pub sum: [u32; SCALER_CHANNELS],
    /// Count rate in the latest read period, per second.
    pub rate: [f64; SCALER_CHANNELS],
    pub variables: ScalerVariables,
}

impl Scaler {
    pub fn new(side: &str) -> Self {
        Scaler {
            count: [0; SCALER_CHANNELS],
            sum: [0; SCALER_CHANNELS],
            rate: [0.0; SCALER_CHANNELS],
            variables: ScalerVariables::new(side),
        }
    }

    /// All counters to zero; called at run start.
    pub fn reset(&mut self) {
        self.count = [0; SCALER_CHANNELS];
        self.sum = [0; SCALER_CHANNELS];
        self.rate = [0.0; SCALER_CHANNELS];
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables.set(source);
    }

    /// Name of a channel.
    pub fn channel_name(&self, ch: usize) -> &str {
        &self.variables.names[ch]
    }

    /// Accumulate one scaler event.
    ///
    /// A missing count bank reads as an empty period; a malformed one fails
    /// the event.
    pub fn unpack(&mut self, event: &Event) -> Result<(), DecodeError> {
        self.count = [0; SCALER_CHANNELS];
        if let Some(bank) = event.bank(&self.variables.count_bank)? {
            let words = bank.u32s()?;
            if words.len() != SCALER_CHANNELS {
                return Err(DecodeError::ScalerSize(words.len()));
            }
            self.count.copy_from_slice(&words);
        }

        let period_sec = match event.bank(&self.variables.header_bank)? {
            Some(bank) => {
                let words = bank.u32s()?;
                let period_us = *words.first().ok_or(DecodeError::ScalerHeaderEmpty)?;
                period_us as f64 * 1.0e-6
            }
            None => 0.0,
        };

        for i in 0..SCALER_CHANNELS {
            self.sum[i] = self.sum[i].wrapping_add(self.count[i]);
            self.rate[i] = if period_sec > 0.0 {
                self.count[i] as f64 / period_sec
            } else {
                0.0
            };
        }
        Ok(())
    }
}
