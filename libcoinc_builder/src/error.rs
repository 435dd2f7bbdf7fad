use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

/// Error type surfaced by record consumers.
///
/// Consumer failures are opaque to the core; they propagate out of the queue
/// and engine unchanged.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum BankError {
    #[error("Payload container smaller than its 8-byte header ({0} bytes)")]
    ContainerTooSmall(usize),
    #[error("Payload bank-section size {written} does not match container size {actual}")]
    ContainerSizeMismatch { written: u32, actual: usize },
    #[error("Bank {tag:?} extends past the end of the payload")]
    Truncated { tag: String },
    #[error("Bank {tag:?} has element type {found}; expected {expected}")]
    WrongType { tag: String, expected: u16, found: u16 },
    #[error("Unknown bank element type code {0}")]
    UnknownType(u16),
}

#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("Failed to read bank data: {0}")]
    Bank(#[from] BankError),
    #[error("ADC bank does not start with a header word (found {0:#010x})")]
    AdcMissingHeader(u32),
    #[error("ADC bank does not end with an end-of-block word")]
    AdcMissingEob,
    #[error("Invalid ADC channel {0} in data word")]
    AdcBadChannel(u32),
    #[error("Unrecognized ADC word type in {0:#010x}")]
    AdcBadWord(u32),
    #[error("Invalid TDC channel {0} in measurement word")]
    TdcBadChannel(u32),
    #[error("Unrecognized TDC word type in {0:#010x}")]
    TdcBadWord(u32),
    #[error("TDC bank is not closed by a trailer word")]
    TdcMissingTrailer,
    #[error("FPGA header bank has {0} words; expected {expected}", expected = super::modules::FPGA_BANK_WORDS)]
    FpgaHeaderSize(usize),
    #[error("Scaler count bank has {0} words; expected {expected}", expected = super::scaler::SCALER_CHANNELS)]
    ScalerSize(usize),
    #[error("Scaler header bank is empty")]
    ScalerHeaderEmpty,
    #[error("Event {0} carries no trigger timestamp")]
    NoTriggerTime(u32),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Event queue still over capacity ({0} events) after a full drain")]
    Exhausted(usize),
    #[error("Event consumer failed: {0}")]
    Handler(#[source] SinkError),
}

#[derive(Debug, Error)]
pub enum VariablesError {
    #[error("Could not open variables file {0:?}")]
    BadFilePath(PathBuf),
    #[error("Variables file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Variables file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open event file because {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event stream ended in the middle of a record")]
    TruncatedRecord,
    #[error("Event file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Skippable malformed event (serial {serial}): {source}")]
    BadEvent {
        serial: u32,
        #[source]
        source: BankError,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine failed due to queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Engine failed due to consumer error: {0}")]
    Sink(#[source] SinkError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Engine error: {0}")]
    EngineError(#[from] EngineError),
    #[error("Processor failed due to EventFile error: {0}")]
    FileError(#[from] EventFileError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Variables error: {0}")]
    VariablesError(#[from] VariablesError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
