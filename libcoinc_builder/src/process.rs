//! Run-level driver: streams run files through an engine and reports
//! progress to the UI thread.

use std::sync::mpsc::Sender;

use super::config::Config;
use super::engine::{CountingSink, Engine};
use super::error::{EventFileError, ProcessorError};
use super::event_file::EventReader;
use super::variables::{VariableSource, YamlSource};
use super::worker_status::WorkerStatus;

/// What one run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_number: i32,
    pub events_read: u64,
    /// Events skipped at the file level (malformed payload container).
    pub skipped_events: u64,
    /// Events dropped by the engine's decoders.
    pub decode_errors: u64,
    pub flush_timed_out: bool,
    pub counts: CountingSink,
}

/// The main loop for one run.
///
/// Reads the run file event by event, routes everything through the engine,
/// and flushes the queue at the end. Malformed events are skipped with a
/// warning; consumer and IO failures abort the run.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<RunSummary, ProcessorError> {
    let run_path = config.get_run_file(run_number);
    let total_size = std::fs::metadata(&run_path)?.len().max(1);
    spdlog::info!(
        "Processing run {} ({})",
        run_number,
        human_bytes::human_bytes(total_size as f64)
    );

    let variables = match &config.variables_path {
        Some(path) => Some(YamlSource::from_file(path)?),
        None => {
            spdlog::warn!("No variables file configured; using identity calibrations");
            None
        }
    };
    let variables_dyn = variables.as_ref().map(|v| v as &dyn VariableSource);

    let mut engine = Engine::new(config.queue_config(), CountingSink::default());
    if let Some(source) = variables_dyn {
        engine.begin_run(source);
    }

    let mut reader = EventReader::open(&run_path)?;
    let mut skipped: u64 = 0;
    let flush_frac = 0.01;
    let mut reported: f64 = 0.0;
    tx.send(WorkerStatus::new(0.0, run_number, worker_id, 0))?;

    loop {
        match reader.next_event() {
            Ok(Some(event)) => {
                engine.process_event(event)?;
                let progress = reader.bytes_read() as f64 / total_size as f64;
                if progress - reported > flush_frac {
                    reported = progress;
                    tx.send(WorkerStatus::new(
                        progress as f32,
                        run_number,
                        worker_id,
                        reader.events_read(),
                    ))?;
                }
            }
            Ok(None) => break,
            Err(EventFileError::BadEvent { serial, source }) => {
                spdlog::warn!("Skipping malformed event {}: {}", serial, source);
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let flush_timed_out = engine.end_run(variables_dyn, config.flush_timeout())?;
    if flush_timed_out {
        spdlog::warn!(
            "Run {} flush hit the {:.1} s deadline; residual events were discarded",
            run_number,
            config.flush_timeout_sec
        );
    }

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        worker_id,
        reader.events_read(),
    ))?;

    let summary = RunSummary {
        run_number,
        events_read: reader.events_read(),
        skipped_events: skipped,
        decode_errors: engine.decode_errors(),
        flush_timed_out,
        counts: engine.sink().clone(),
    };
    spdlog::info!(
        "Finished run {}: {} events ({} head, {} tail, {} coinc reports, \
         {} scaler reads), {} skipped, {} decode errors",
        run_number,
        summary.events_read,
        summary.counts.head_singles,
        summary.counts.tail_singles,
        summary.counts.coincidences,
        summary.counts.head_scaler_reads + summary.counts.tail_scaler_reads,
        summary.skipped_events,
        summary.decode_errors,
    );
    Ok(summary)
}

/// Process a subset of runs; missing runs are skipped with a note.
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<Vec<RunSummary>, ProcessorError> {
    let mut summaries = Vec::new();
    for run in subset {
        if config.does_run_exist(run) {
            summaries.push(process_run(&config, run, &tx, worker_id)?);
        } else {
            spdlog::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(summaries)
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}
