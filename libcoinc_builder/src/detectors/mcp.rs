use crate::modules::{AdcModule, TdcModule};
use crate::nodata::{is_valid, sum_valid, NO_DATA};
use crate::variables::{
    calibrate_adc, calibrate_tdc, read_adc, read_tdc, AdcVariables, TdcVariables, VariableSource,
};

/// Number of anodes on the first micro-channel plate.
pub const MCP_CHANNELS: usize = 4;
/// Number of separate MCP detectors (each with a timing channel).
pub const MCP_DETECTORS: usize = 2;

/// Half the side length of the active area, in mm.
const L_HALF: f64 = 25.0;

const VARS_BASE: &str = "/Equipment/tail/mcp/variables";

#[derive(Debug, Clone, Default)]
pub struct McpVariables {
    pub adc: AdcVariables<MCP_CHANNELS>,
    /// TAC signal (MCP0 -> MCP1 time-to-amplitude converter).
    pub tac_adc: AdcVariables<1>,
    pub tdc: TdcVariables<MCP_DETECTORS>,
}

impl McpVariables {
    pub fn reset(&mut self) {
        self.adc.reset();
        self.tac_adc.reset();
        self.tdc.reset();
    }

    pub fn set(&mut self, source: &dyn VariableSource) {
        self.adc.set(source, &format!("{VARS_BASE}/adc"));
        self.tac_adc.set(source, &format!("{VARS_BASE}/tac_adc"));
        self.tdc.set(source, &format!("{VARS_BASE}/tdc"));
    }
}

/// Micro-channel plate pair.
#[derive(Debug, Clone)]
pub struct Mcp {
    /// Calibrated anode signals (MCP0).
    pub anode: [f64; MCP_CHANNELS],
    /// Calibrated times, one per plate.
    pub tcal: [f64; MCP_DETECTORS],
    /// Sum of valid anode signals.
    pub esum: f64,
    /// Calibrated TAC signal.
    pub tac: f64,
    /// Anode-weighted x position, mm.
    pub x: f64,
    /// Anode-weighted y position, mm.
    pub y: f64,
    pub variables: McpVariables,
}

impl Mcp {
    pub fn new() -> Self {
        Mcp {
            anode: [NO_DATA; MCP_CHANNELS],
            tcal: [NO_DATA; MCP_DETECTORS],
            esum: NO_DATA,
            tac: NO_DATA,
            x: NO_DATA,
            y: NO_DATA,
            variables: McpVariables::default(),
        }
    }

    pub fn reset(&mut self) {
        self.anode = [NO_DATA; MCP_CHANNELS];
        self.tcal = [NO_DATA; MCP_DETECTORS];
        self.esum = NO_DATA;
        self.tac = NO_DATA;
        self.x = NO_DATA;
        self.y = NO_DATA;
    }

    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.variables.set(source);
    }

    pub fn read_data(&mut self, adcs: &[AdcModule], tdc: &TdcModule) {
        read_adc(&mut self.anode, adcs, &self.variables.adc);
        let mut tac = [NO_DATA; 1];
        read_adc(&mut tac, adcs, &self.variables.tac_adc);
        self.tac = tac[0];
        read_tdc(&mut self.tcal, tdc, &self.variables.tdc);
    }

    pub fn calculate(&mut self) {
        calibrate_adc(&mut self.anode, &self.variables.adc);
        let mut tac = [self.tac];
        calibrate_adc(&mut tac, &self.variables.tac_adc);
        self.tac = tac[0];
        calibrate_tdc(&mut self.tcal, &self.variables.tdc);

        self.esum = sum_valid(&self.anode);

        // The centroid is only defined when all four corners fired.
        if self.anode.iter().all(|&a| is_valid(a)) {
            let [a0, a1, a2, a3] = self.anode;
            let sum = a0 + a1 + a2 + a3;
            if sum != 0.0 {
                self.x = L_HALF * ((a1 + a2) - (a0 + a3)) / sum;
                self.y = L_HALF * ((a0 + a1) - (a2 + a3)) / sum;
            }
        }
    }
}

impl Default for Mcp {
    fn default() -> Self {
        Mcp::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcp_with_anodes(values: [i16; 4]) -> Mcp {
        let mut adc = AdcModule::new();
        adc.data[..4].copy_from_slice(&values);
        let mut mcp = Mcp::new();
        // Keep the TAC off a mapped anode channel.
        mcp.variables.tac_adc.channel = [8];
        mcp.read_data(std::slice::from_ref(&adc), &TdcModule::new());
        mcp.calculate();
        mcp
    }

    #[test]
    fn centered_hit() {
        let mcp = mcp_with_anodes([100, 100, 100, 100]);
        assert_eq!(mcp.x, 0.0);
        assert_eq!(mcp.y, 0.0);
        assert_eq!(mcp.esum, 400.0);
    }

    #[test]
    fn displaced_hit() {
        // All the charge on anodes 1 and 2: full positive x, balanced y.
        let mcp = mcp_with_anodes([0, 200, 200, 0]);
        assert_eq!(mcp.x, 25.0);
        assert_eq!(mcp.y, 0.0);
    }

    #[test]
    fn missing_anode_kills_the_position() {
        let mut adc = AdcModule::new();
        adc.data[0] = 100;
        adc.data[1] = 100;
        adc.data[2] = 100; // anode 3 never converted
        let mut mcp = Mcp::new();
        mcp.variables.tac_adc.channel = [8];
        mcp.read_data(std::slice::from_ref(&adc), &TdcModule::new());
        mcp.calculate();

        assert!(!is_valid(mcp.x));
        assert!(!is_valid(mcp.y));
        assert_eq!(mcp.esum, 300.0); // the sum still skips the sentinel
    }

    #[test]
    fn tac_uses_its_own_channel() {
        let mut adc = AdcModule::new();
        adc.data[8] = 1000;
        let mut mcp = Mcp::new();
        mcp.variables.tac_adc.channel = [8];
        mcp.variables.tac_adc.slope = [2.0];
        mcp.read_data(std::slice::from_ref(&adc), &TdcModule::new());
        mcp.calculate();
        assert_eq!(mcp.tac, 2000.0);
    }
}
