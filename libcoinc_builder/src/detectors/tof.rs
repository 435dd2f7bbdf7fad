use crate::nodata::NO_DATA;

use super::dsssd::Dsssd;
use super::ion_chamber::IonChamber;
use super::mcp::Mcp;

/// Time-of-flight between the heavy-ion detectors downstream of MCP0.
///
/// All flights start at MCP0; a missing time on either end propagates the
/// sentinel through the difference.
#[derive(Debug, Clone)]
pub struct HiTof {
    /// MCP0 -> MCP1.
    pub mcp: f64,
    /// MCP0 -> DSSSD.
    pub mcp_dsssd: f64,
    /// MCP0 -> ion chamber.
    pub mcp_ic: f64,
}

impl HiTof {
    pub fn new() -> Self {
        HiTof {
            mcp: NO_DATA,
            mcp_dsssd: NO_DATA,
            mcp_ic: NO_DATA,
        }
    }

    pub fn reset(&mut self) {
        self.mcp = NO_DATA;
        self.mcp_dsssd = NO_DATA;
        self.mcp_ic = NO_DATA;
    }

    pub fn calculate(&mut self, mcp: &Mcp, dsssd: &Dsssd, ic: &IonChamber) {
        self.mcp = mcp.tcal[1] - mcp.tcal[0];
        self.mcp_dsssd = dsssd.tcal - mcp.tcal[0];
        self.mcp_ic = ic.tcal - mcp.tcal[0];
    }
}

impl Default for HiTof {
    fn default() -> Self {
        HiTof::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodata::is_valid;

    #[test]
    fn flights_are_differences_from_mcp0() {
        let mut mcp = Mcp::new();
        mcp.tcal = [100.0, 340.0];
        let mut dsssd = Dsssd::new();
        dsssd.tcal = 500.0;
        let ic = IonChamber::new();

        let mut tof = HiTof::new();
        tof.calculate(&mcp, &dsssd, &ic);
        assert_eq!(tof.mcp, 240.0);
        assert_eq!(tof.mcp_dsssd, 400.0);
        assert!(!is_valid(tof.mcp_ic)); // no IC time
    }
}
