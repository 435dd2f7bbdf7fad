//! The event-processing engine.
//!
//! Owns both assemblers, the coincidence queue, the scalers and the run
//! parameters, and routes every incoming event by its id. Consumers
//! register once, at construction, through the [`RecordSink`] trait; each
//! sink method is the outlet for one emitted record kind.

use super::coinc::Coinc;
use super::constants::*;
use super::error::{EngineError, SinkError};
use super::event::Event;
use super::head::Head;
use super::modules;
use super::queue::{Diagnostics, EventHandler, Queue, QueueConfig};
use super::run_parameters::RunParameters;
use super::scaler::Scaler;
use super::tail::Tail;
use super::variables::VariableSource;

/// Consumer boundary for everything the engine emits.
///
/// Implementors receive calibrated records for histogramming, persistence,
/// or bookkeeping. Coincidence pairs arrive twice, once from each vantage
/// of the pair; consumers that want one entry per pair de-duplicate on the
/// two serial numbers.
pub trait RecordSink {
    /// A head singles event, fully calibrated.
    fn head(&mut self, head: &Head) -> Result<(), SinkError>;
    /// A tail singles event, fully calibrated.
    fn tail(&mut self, tail: &Tail) -> Result<(), SinkError>;
    /// A matched coincidence (emitted event id [`COINC_EVENT`]).
    fn coinc(&mut self, coinc: &Coinc) -> Result<(), SinkError>;
    /// Head scaler passthrough (emitted event id [`HEAD_SCALER_OUT`]).
    fn head_scaler(&mut self, scaler: &Scaler) -> Result<(), SinkError>;
    /// Tail scaler passthrough (emitted event id [`TAIL_SCALER_OUT`]).
    fn tail_scaler(&mut self, scaler: &Scaler) -> Result<(), SinkError>;
    /// Queue statistics, refreshed after every queue push.
    fn diagnostics(&mut self, _diagnostics: &Diagnostics) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Queue-emission adapter: unpacks popped events into the engine's records
/// and forwards them to the sink. Decode failures are absorbed here so one
/// bad event never poisons the stream.
struct Dispatch<'a, S: RecordSink> {
    head: &'a mut Head,
    tail: &'a mut Tail,
    coinc: &'a mut Coinc,
    sink: &'a mut S,
    decode_errors: &'a mut u64,
}

impl<S: RecordSink> EventHandler for Dispatch<'_, S> {
    fn on_single(&mut self, event: Event) -> Result<(), SinkError> {
        match event.header.event_id {
            HEAD_EVENT => {
                self.head.reset();
                if let Err(e) = self.head.unpack(&event) {
                    spdlog::error!("Skipping head event {}: {}", event.header.serial, e);
                    *self.decode_errors += 1;
                    return Ok(());
                }
                self.head.calculate();
                self.sink.head(self.head)
            }
            TAIL_EVENT => {
                self.tail.reset();
                if let Err(e) = self.tail.unpack(&event) {
                    spdlog::error!("Skipping tail event {}: {}", event.header.serial, e);
                    *self.decode_errors += 1;
                    return Ok(());
                }
                self.tail.calculate();
                self.sink.tail(self.tail)
            }
            other => {
                spdlog::warn!("Unexpected event id {} left the queue, ignoring", other);
                Ok(())
            }
        }
    }

    fn on_coinc(&mut self, popped: &Event, partner: &Event) -> Result<(), SinkError> {
        let (head_event, tail_event) = if popped.header.event_id == HEAD_EVENT {
            (popped, partner)
        } else {
            (partner, popped)
        };
        if let Err(e) = self.coinc.unpack(head_event, tail_event) {
            spdlog::error!(
                "Skipping coincidence ({}, {}): {}",
                head_event.header.serial,
                tail_event.header.serial,
                e
            );
            *self.decode_errors += 1;
            return Ok(());
        }
        self.coinc.calculate();
        self.sink.coinc(self.coinc)
    }
}

/// The engine. One instance per run stream; not safe for concurrent use.
#[derive(Debug)]
pub struct Engine<S: RecordSink> {
    head: Head,
    tail: Tail,
    coinc: Coinc,
    head_scaler: Scaler,
    tail_scaler: Scaler,
    run_parameters: RunParameters,
    queue: Queue,
    diagnostics: Diagnostics,
    decode_errors: u64,
    sink: S,
}

impl<S: RecordSink> Engine<S> {
    /// Build an engine around its consumer.
    pub fn new(queue_config: QueueConfig, sink: S) -> Self {
        Engine {
            head: Head::new(),
            tail: Tail::new(),
            coinc: Coinc::new(),
            head_scaler: Scaler::new("head"),
            tail_scaler: Scaler::new("tail"),
            run_parameters: RunParameters::new(),
            queue: Queue::new(queue_config),
            diagnostics: Diagnostics::new(),
            decode_errors: 0,
            sink,
        }
    }

    /// Load every variable set from the configuration store.
    pub fn set_variables(&mut self, source: &dyn VariableSource) {
        self.head.set_variables(source);
        self.tail.set_variables(source);
        self.coinc.set_variables(source);
        self.head_scaler.set_variables(source);
        self.tail_scaler.set_variables(source);
    }

    /// Run-start bookkeeping: variables, counters and run parameters.
    pub fn begin_run(&mut self, source: &dyn VariableSource) {
        self.set_variables(source);
        self.head_scaler.reset();
        self.tail_scaler.reset();
        self.diagnostics.reset();
        self.decode_errors = 0;
        self.run_parameters.reset();
        self.run_parameters.read_data(source);
    }

    /// Route one event. Decode failures are logged and counted; they never
    /// fail the stream. Consumer failures propagate.
    pub fn process_event(&mut self, event: Event) -> Result<(), EngineError> {
        match event.header.event_id {
            HEAD_EVENT | TAIL_EVENT => {
                let time = match modules::trigger_time(&event) {
                    Ok(Some(t)) => t,
                    Ok(None) | Err(_) => {
                        spdlog::error!(
                            "Skipping event {} with no usable trigger time",
                            event.header.serial
                        );
                        self.decode_errors += 1;
                        return Ok(());
                    }
                };
                let mut dispatch = Dispatch {
                    head: &mut self.head,
                    tail: &mut self.tail,
                    coinc: &mut self.coinc,
                    sink: &mut self.sink,
                    decode_errors: &mut self.decode_errors,
                };
                self.queue
                    .push(time, event, Some(&mut self.diagnostics), &mut dispatch)?;
                self.sink
                    .diagnostics(&self.diagnostics)
                    .map_err(EngineError::Sink)?;
            }
            HEAD_SCALER => {
                if let Err(e) = self.head_scaler.unpack(&event) {
                    spdlog::error!("Skipping head scaler event: {}", e);
                    self.decode_errors += 1;
                    return Ok(());
                }
                self.sink
                    .head_scaler(&self.head_scaler)
                    .map_err(EngineError::Sink)?;
            }
            TAIL_SCALER => {
                if let Err(e) = self.tail_scaler.unpack(&event) {
                    spdlog::error!("Skipping tail scaler event: {}", e);
                    self.decode_errors += 1;
                    return Ok(());
                }
                self.sink
                    .tail_scaler(&self.tail_scaler)
                    .map_err(EngineError::Sink)?;
            }
            // Other ids are not ours; ignore them silently.
            _ => {}
        }
        Ok(())
    }

    /// Run-stop: flush the queue (bounded by `flush_timeout` seconds when
    /// given) and refresh the run-stop parameters. Returns whether the
    /// flush deadline expired and events were discarded.
    pub fn end_run(
        &mut self,
        source: Option<&dyn VariableSource>,
        flush_timeout: Option<f64>,
    ) -> Result<bool, EngineError> {
        let mut dispatch = Dispatch {
            head: &mut self.head,
            tail: &mut self.tail,
            coinc: &mut self.coinc,
            sink: &mut self.sink,
            decode_errors: &mut self.decode_errors,
        };
        let timed_out =
            self.queue
                .flush(flush_timeout, Some(&mut self.diagnostics), &mut dispatch)?;
        if let Some(source) = source {
            self.run_parameters.read_data(source);
        }
        Ok(timed_out)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Events dropped by decode failures so far.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    pub fn run_parameters(&self) -> &RunParameters {
        &self.run_parameters
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// A sink that counts every record kind; the default consumer of the CLI
/// and a convenient test double.
#[derive(Debug, Clone, Default)]
pub struct CountingSink {
    pub head_singles: u64,
    pub tail_singles: u64,
    pub coincidences: u64,
    pub head_scaler_reads: u64,
    pub tail_scaler_reads: u64,
    pub diagnostics_updates: u64,
    pub last_head_trigger: Option<u64>,
    pub last_tail_trigger: Option<u64>,
}

impl RecordSink for CountingSink {
    fn head(&mut self, head: &Head) -> Result<(), SinkError> {
        self.head_singles += 1;
        self.last_head_trigger = Some(head.fpga.trigger_time);
        Ok(())
    }

    fn tail(&mut self, tail: &Tail) -> Result<(), SinkError> {
        self.tail_singles += 1;
        self.last_tail_trigger = Some(tail.fpga.trigger_time);
        Ok(())
    }

    fn coinc(&mut self, _coinc: &Coinc) -> Result<(), SinkError> {
        self.coincidences += 1;
        Ok(())
    }

    fn head_scaler(&mut self, _scaler: &Scaler) -> Result<(), SinkError> {
        self.head_scaler_reads += 1;
        Ok(())
    }

    fn tail_scaler(&mut self, _scaler: &Scaler) -> Result<(), SinkError> {
        self.tail_scaler_reads += 1;
        Ok(())
    }

    fn diagnostics(&mut self, _diagnostics: &Diagnostics) -> Result<(), SinkError> {
        self.diagnostics_updates += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PayloadBuilder;
    use crate::scaler::SCALER_CHANNELS;
    use crate::testutil::{head_event, scaler_event, tail_event};

    fn engine() -> Engine<CountingSink> {
        Engine::new(
            QueueConfig {
                window: 10_000, // 10 us at the nanosecond clock
                max_span: 1_000_000_000,
                max_events: 1 << 20,
            },
            CountingSink::default(),
        )
    }

    #[test]
    fn coincidence_stream_end_to_end() {
        let mut e = engine();
        e.process_event(head_event(1_000_000, 0)).unwrap();
        e.process_event(tail_event(1_005_000, 0)).unwrap();
        let timed_out = e.end_run(None, None).unwrap();
        assert!(!timed_out);

        let sink = e.sink();
        assert_eq!(sink.head_singles, 1);
        assert_eq!(sink.tail_singles, 1);
        // One pair, reported from both vantages.
        assert_eq!(sink.coincidences, 2);
        assert_eq!(sink.last_head_trigger, Some(1_000_000));
        assert_eq!(sink.diagnostics_updates, 2);
        assert_eq!(e.diagnostics().n_singles[HEAD_EVENT as usize], 1);
        assert_eq!(e.diagnostics().n_singles[TAIL_EVENT as usize], 1);
    }

    #[test]
    fn events_outside_window_stay_singles() {
        let mut e = engine();
        e.process_event(head_event(1_000_000, 0)).unwrap();
        e.process_event(tail_event(9_000_000, 0)).unwrap();
        e.end_run(None, None).unwrap();
        assert_eq!(e.sink().coincidences, 0);
        assert_eq!(e.sink().head_singles, 1);
        assert_eq!(e.sink().tail_singles, 1);
    }

    #[test]
    fn scalers_bypass_the_queue() {
        let mut e = engine();
        let counts = [2u32; SCALER_CHANNELS];
        e.process_event(scaler_event(HEAD_SCALER, &counts, 1_000_000))
            .unwrap();
        e.process_event(scaler_event(TAIL_SCALER, &counts, 1_000_000))
            .unwrap();
        assert_eq!(e.queue_size(), 0);
        assert_eq!(e.sink().head_scaler_reads, 1);
        assert_eq!(e.sink().tail_scaler_reads, 1);
    }

    #[test]
    fn decode_errors_never_poison_the_stream() {
        let mut e = engine();
        // A head singles event without any banks has no trigger time.
        let bad = PayloadBuilder::new().into_event(HEAD_EVENT, 77);
        e.process_event(bad).unwrap();
        assert_eq!(e.decode_errors(), 1);

        // The stream continues normally afterwards.
        e.process_event(head_event(2_000_000, 78)).unwrap();
        e.end_run(None, None).unwrap();
        assert_eq!(e.sink().head_singles, 1);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut e = engine();
        let stranger = PayloadBuilder::new().into_event(42, 0);
        e.process_event(stranger).unwrap();
        assert_eq!(e.queue_size(), 0);
        assert_eq!(e.decode_errors(), 0);
    }
}
