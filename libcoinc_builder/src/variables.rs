//! Per-detector calibration variables and the configuration-store boundary.
//!
//! Variables are plain records with identity defaults (map = identity,
//! slope 1, offset 0, pedestal 0). They are written once per run by
//! [`VariableSource`] readers and are read-only while events flow.

use std::path::Path;

use super::error::VariablesError;
use super::modules::{AdcModule, TdcModule};
use super::nodata::{adc_to_f64, tdc_to_f64, ADC_NONE};

/// Channel value marking an unmapped logical channel.
const UNMAPPED: usize = usize::MAX;

/// ADC mapping and calibration for `N` logical channels.
#[derive(Debug, Clone)]
pub struct AdcVariables<const N: usize> {
    /// Which ADC module each logical channel reads from.
    pub module: [usize; N],
    /// Physical ADC channel for each logical channel.
    pub channel: [usize; N],
    pub pedestal: [f64; N],
    pub slope: [f64; N],
    pub offset: [f64; N],
}

impl<const N: usize> AdcVariables<N> {
    pub fn new() -> Self {
        let mut channel = [0usize; N];
        for (i, ch) in channel.iter_mut().enumerate() {
            *ch = i;
        }
        AdcVariables {
            module: [0; N],
            channel,
            pedestal: [0.0; N],
            slope: [1.0; N],
            offset: [0.0; N],
        }
    }

    pub fn reset(&mut self) {
        *self = AdcVariables::new();
    }

    /// Read `{base}_module`, `{base}_channel`, `{base}_pedestal`,
    /// `{base}_slope`, `{base}_offset`. Missing keys keep their defaults.
    pub fn set(&mut self, source: &dyn VariableSource, base: &str) {
        read_usize_array(source, &format!("{base}_module"), &mut self.module);
        read_usize_array(source, &format!("{base}_channel"), &mut self.channel);
        read_double_array(source, &format!("{base}_pedestal"), &mut self.pedestal);
        read_double_array(source, &format!("{base}_slope"), &mut self.slope);
        read_double_array(source, &format!("{base}_offset"), &mut self.offset);
    }
}

impl<const N: usize> Default for AdcVariables<N> {
    fn default() -> Self {
        AdcVariables::new()
    }
}

/// TDC mapping and calibration for `N` logical channels.
#[derive(Debug, Clone)]
pub struct TdcVariables<const N: usize> {
    pub channel: [usize; N],
    pub slope: [f64; N],
    pub offset: [f64; N],
}

impl<const N: usize> TdcVariables<N> {
    pub fn new() -> Self {
        let mut channel = [0usize; N];
        for (i, ch) in channel.iter_mut().enumerate() {
            *ch = i;
        }
        TdcVariables {
            channel,
            slope: [1.0; N],
            offset: [0.0; N],
        }
    }

    pub fn reset(&mut self) {
        *self = TdcVariables::new();
    }

    /// Read `{base}_channel`, `{base}_slope`, `{base}_offset`.
    pub fn set(&mut self, source: &dyn VariableSource, base: &str) {
        read_usize_array(source, &format!("{base}_channel"), &mut self.channel);
        read_double_array(source, &format!("{base}_slope"), &mut self.slope);
        read_double_array(source, &format!("{base}_offset"), &mut self.offset);
    }
}

impl<const N: usize> Default for TdcVariables<N> {
    fn default() -> Self {
        TdcVariables::new()
    }
}

/// Spatial positions of `N` detector elements.
#[derive(Debug, Clone)]
pub struct PositionVariables<const N: usize> {
    pub x: [f64; N],
    pub y: [f64; N],
    pub z: [f64; N],
}

impl<const N: usize> PositionVariables<N> {
    pub fn new() -> Self {
        PositionVariables {
            x: [0.0; N],
            y: [0.0; N],
            z: [0.0; N],
        }
    }

    pub fn reset(&mut self) {
        *self = PositionVariables::new();
    }

    /// Read `{base}_x`, `{base}_y`, `{base}_z`.
    pub fn set(&mut self, source: &dyn VariableSource, base: &str) {
        read_double_array(source, &format!("{base}_x"), &mut self.x);
        read_double_array(source, &format!("{base}_y"), &mut self.y);
        read_double_array(source, &format!("{base}_z"), &mut self.z);
    }
}

impl<const N: usize> Default for PositionVariables<N> {
    fn default() -> Self {
        PositionVariables::new()
    }
}

/// Copy raw ADC samples through the channel map, promoting to doubles.
pub fn read_adc<const N: usize>(
    values: &mut [f64; N],
    adcs: &[AdcModule],
    vars: &AdcVariables<N>,
) {
    for i in 0..N {
        let raw = adcs
            .get(vars.module[i])
            .map_or(ADC_NONE, |adc| adc.get_data(vars.channel[i]));
        values[i] = adc_to_f64(raw);
    }
}

/// Copy raw TDC leading-edge times through the channel map.
pub fn read_tdc<const N: usize>(values: &mut [f64; N], tdc: &TdcModule, vars: &TdcVariables<N>) {
    for i in 0..N {
        values[i] = tdc_to_f64(tdc.get_leading(vars.channel[i]));
    }
}

/// Linear calibration of one value. Sentinels (NaN) pass through untouched.
pub fn calibrate(raw: f64, slope: f64, pedestal: f64, offset: f64) -> f64 {
    slope * (raw - pedestal) + offset
}

/// Calibrate a raw ADC array in place.
pub fn calibrate_adc<const N: usize>(values: &mut [f64; N], vars: &AdcVariables<N>) {
    for i in 0..N {
        values[i] = calibrate(values[i], vars.slope[i], vars.pedestal[i], vars.offset[i]);
    }
}

/// Calibrate a raw TDC array in place (no pedestal).
pub fn calibrate_tdc<const N: usize>(values: &mut [f64; N], vars: &TdcVariables<N>) {
    for i in 0..N {
        values[i] = calibrate(values[i], vars.slope[i], 0.0, vars.offset[i]);
    }
}

/// Read one mapped TDC channel and calibrate it.
pub fn tdc_channel_value(tdc: &TdcModule, vars: &TdcVariables<1>) -> f64 {
    let mut t = [f64::NAN];
    read_tdc(&mut t, tdc, vars);
    calibrate_tdc(&mut t, vars);
    t[0]
}

/// Read a 4-character bank tag, warning and keeping the default on a bad
/// length.
pub fn read_bank_tag(source: &dyn VariableSource, path: &str, dest: &mut [u8; 4]) {
    let mut name = String::new();
    if !source.get_string(path, &mut name) {
        spdlog::warn!("Variable {} not found, keeping defaults", path);
        return;
    }
    match <[u8; 4]>::try_from(name.as_bytes()) {
        Ok(tag) => *dest = tag,
        Err(_) => {
            spdlog::warn!("Bank name {:?} at {} is not 4 characters, keeping default", name, path)
        }
    }
}

/// Read boundary to the hierarchical configuration store.
///
/// Every getter returns `true` when the key was found and read. Callers
/// treat a missing key as "keep defaults", never as an error.
pub trait VariableSource {
    fn get_int_array(&self, path: &str, dest: &mut [i32]) -> bool;
    fn get_double_array(&self, path: &str, dest: &mut [f64]) -> bool;
    fn get_string(&self, path: &str, dest: &mut String) -> bool;
}

fn read_usize_array(source: &dyn VariableSource, path: &str, dest: &mut [usize]) {
    let mut ints = vec![0i32; dest.len()];
    for (i, slot) in ints.iter_mut().enumerate() {
        *slot = if dest[i] == UNMAPPED { -1 } else { dest[i] as i32 };
    }
    if !source.get_int_array(path, &mut ints) {
        spdlog::warn!("Variable {} not found, keeping defaults", path);
        return;
    }
    for (slot, &v) in dest.iter_mut().zip(ints.iter()) {
        // Negative entries mark unconnected channels; they read as sentinels.
        *slot = if v < 0 { UNMAPPED } else { v as usize };
    }
}

fn read_double_array(source: &dyn VariableSource, path: &str, dest: &mut [f64]) {
    if !source.get_double_array(path, dest) {
        spdlog::warn!("Variable {} not found, keeping defaults", path);
    }
}

/// Read a single string value, warning when absent.
pub fn read_string(source: &dyn VariableSource, path: &str, dest: &mut String) {
    if !source.get_string(path, dest) {
        spdlog::warn!("Variable {} not found, keeping defaults", path);
    }
}

/// A [`VariableSource`] over a YAML document.
///
/// Keys are `/`-separated paths into nested mappings; numeric segments index
/// sequences. Arrays shorter than the destination fill a prefix and leave
/// the rest at defaults.
#[derive(Debug, Clone)]
pub struct YamlSource {
    root: serde_yaml::Value,
}

impl YamlSource {
    pub fn from_file(path: &Path) -> Result<Self, VariablesError> {
        if !path.exists() {
            return Err(VariablesError::BadFilePath(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    pub fn from_str(text: &str) -> Result<Self, VariablesError> {
        Ok(YamlSource {
            root: serde_yaml::from_str(text)?,
        })
    }

    fn lookup(&self, path: &str) -> Option<&serde_yaml::Value> {
        let mut node = &self.root;
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            node = match seg.parse::<usize>() {
                Ok(idx) => node.get(idx)?,
                Err(_) => node.get(seg)?,
            };
        }
        Some(node)
    }
}

impl VariableSource for YamlSource {
    fn get_int_array(&self, path: &str, dest: &mut [i32]) -> bool {
        match self.lookup(path) {
            Some(serde_yaml::Value::Sequence(seq)) => {
                for (slot, value) in dest.iter_mut().zip(seq.iter()) {
                    if let Some(v) = value.as_i64() {
                        *slot = v as i32;
                    }
                }
                true
            }
            Some(value) => match value.as_i64() {
                Some(v) => {
                    if let Some(slot) = dest.first_mut() {
                        *slot = v as i32;
                    }
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    fn get_double_array(&self, path: &str, dest: &mut [f64]) -> bool {
        match self.lookup(path) {
            Some(serde_yaml::Value::Sequence(seq)) => {
                for (slot, value) in dest.iter_mut().zip(seq.iter()) {
                    if let Some(v) = value.as_f64() {
                        *slot = v;
                    }
                }
                true
            }
            Some(value) => match value.as_f64() {
                Some(v) => {
                    if let Some(slot) = dest.first_mut() {
                        *slot = v;
                    }
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    fn get_string(&self, path: &str, dest: &mut String) -> bool {
        match self.lookup(path).and_then(|v| v.as_str()) {
            Some(s) => {
                *dest = s.to_string();
                true
            }
            None => false,
        }
    }
}
