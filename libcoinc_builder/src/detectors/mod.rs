//! Detector calculators.
//!
//! Every detector follows the same per-event sequence: `reset()` to
//! sentinels, `read_data()` to copy raw samples through its channel map,
//! `calculate()` to calibrate and derive aggregates. Variables are loaded
//! once per run via `set_variables()`.

pub mod auxiliary;
pub mod bgo;
pub mod dsssd;
pub mod ion_chamber;
pub mod mcp;
pub mod tof;

pub use auxiliary::{Ge, NaI, SurfaceBarrier};
pub use bgo::Bgo;
pub use dsssd::Dsssd;
pub use ion_chamber::IonChamber;
pub use mcp::Mcp;
pub use tof::HiTof;
