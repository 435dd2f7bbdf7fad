//! # libcoinc_builder
//!
//! libcoinc_builder is the event-correlation core for a two-frontend
//! nuclear-physics data acquisition: a "head" frontend reading the gamma
//! detectors and a "tail" frontend reading the heavy-ion detectors, each
//! stamping its events with a 64-bit FPGA trigger time. The library turns
//! the two raw streams into calibrated singles and coincidence records:
//!
//! - the bank-oriented payload of every event is decoded into typed module
//!   records (multi-channel ADCs, a multi-hit TDC, the FPGA trigger header),
//! - per-channel calibrations map raw samples onto physics observables for
//!   each detector (BGO array, DSSSD, ion chamber, MCPs, surface barriers,
//!   NaI, Ge), with a NaN sentinel marking channels that carried no data,
//! - a timestamp-ordered queue buffers events from both frontends, tolerant
//!   of any arrival order, and emits every event once as a single plus a
//!   coincidence report for each cross-frontend partner within the
//!   configured window.
//!
//! ## Using the library
//!
//! The typical driver builds an [`engine::Engine`] around a consumer
//! implementing [`engine::RecordSink`], loads calibration variables from a
//! [`variables::VariableSource`], and feeds it events from an
//! [`event_file::EventReader`]:
//!
//! ```no_run
//! use libcoinc_builder::config::Config;
//! use libcoinc_builder::engine::{CountingSink, Engine};
//! use libcoinc_builder::event_file::EventReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::read_config_file(std::path::Path::new("config.yaml"))?;
//! let mut engine = Engine::new(config.queue_config(), CountingSink::default());
//! let mut reader = EventReader::open(&config.get_run_file(1))?;
//! while let Some(event) = reader.next_event()? {
//!     engine.process_event(event)?;
//! }
//! engine.end_run(None, config.flush_timeout())?;
//! println!("{} coincidence reports", engine.sink().coincidences);
//! # Ok(())
//! # }
//! ```
//!
//! Scaler events bypass the queue entirely and reach the sink as
//! passthrough records; run-level bookkeeping (run and trigger start/stop
//! times) is tracked per frontend in [`run_parameters::RunParameters`].
//!
//! ## What the library does not do
//!
//! Histogramming, plotting and persistence live behind the sink boundary in
//! the consuming application; the command-line driver in this workspace
//! only counts and logs. Variable stores other than YAML dumps (live
//! key-value services) are likewise left to the caller.

pub mod coinc;
pub mod config;
pub mod constants;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_file;
pub mod head;
pub mod modules;
pub mod nodata;
pub mod process;
pub mod queue;
pub mod run_parameters;
pub mod scaler;
pub mod tail;
pub mod variables;
pub mod worker_status;

#[cfg(test)]
mod testutil;
