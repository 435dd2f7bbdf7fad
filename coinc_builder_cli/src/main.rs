//! # coinc_builder_cli
//!
//! Command-line driver for the coincidence event builder.
//!
//! ## Use
//!
//! To process a run range use the following command
//!
//! ```bash
//! coinc_builder_cli -p/--path <your_configuration.yaml>
//! ```
//!
//! To generate a configuration template file use
//!
//! ```bash
//! coinc_builder_cli -p/--path <your_configuration.yaml> new
//! ```
//!
//! ## Configuration
//!
//! The following fields must be specified in the configuration file:
//!
//! - data_path: full path to a directory containing the run files (run_NNNN.dat)
//! - variables_path: optional full path to a YAML variables dump; identity calibrations are used when null
//! - first_run_number: the starting run number (inclusive)
//! - last_run_number: the ending run number (inclusive)
//! - n_threads: number of parallel workers the run range is divided amongst
//! - coincidence_window_us: coincidence window in microseconds
//! - max_buffered_sec: maximum buffered time span of the queue in seconds
//! - flush_timeout_sec: run-stop flush deadline in seconds (negative drains fully)
//!
//! ## Exit codes
//!
//! 0 on success, 1 on an unrecoverable processing error, 2 on a missing or
//! invalid configuration, 3 when a flush deadline discarded events.

use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libcoinc_builder::config::Config;
use libcoinc_builder::error::ProcessorError;
use libcoinc_builder::process::{create_subsets, process_subset};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could not create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn exit_code_for(error: &ProcessorError) -> i32 {
    match error {
        ProcessorError::ConfigError(_) | ProcessorError::VariablesError(_) => 2,
        _ => 1,
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("coinc_builder_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if matches.subcommand_matches("new").is_some() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(2);
        }
    };
    if !config.is_n_threads_valid() {
        log::error!("n_threads must be at least 1");
        std::process::exit(2);
    }
    log::info!("Config successfully loaded.");
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    match &config.variables_path {
        Some(p) => log::info!("Variables Path: {}", p.to_string_lossy()),
        None => log::info!("Variables Path: none (identity calibrations)"),
    }
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    log::info!(
        "Coincidence Window: {} us, Buffered Span: {} s, Flush Timeout: {} s",
        config.coincidence_window_us,
        config.max_buffered_sec,
        config.flush_timeout_sec
    );

    // Spawn the workers, one progress bar each
    let (tx, rx) = mpsc::channel();
    let mut handles = Vec::new();
    let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
    for (worker_id, subset) in create_subsets(&config).into_iter().enumerate() {
        if subset.is_empty() {
            continue;
        }
        bars.insert(worker_id, pb_manager.add(ProgressBar::new(100)));
        let tx = tx.clone();
        let config = config.clone();
        handles.push(std::thread::spawn(move || {
            process_subset(config, tx, worker_id, subset)
        }));
    }
    drop(tx);

    // Drain progress until every worker hangs up
    while let Ok(status) = rx.recv() {
        if let Some(bar) = bars.get(&status.worker_id) {
            bar.set_position((status.progress * 100.0) as u64);
        }
    }

    let mut exit_code = 0;
    for handle in handles {
        match handle.join() {
            Ok(Ok(summaries)) => {
                for summary in summaries {
                    if summary.flush_timed_out && exit_code == 0 {
                        exit_code = 3;
                    }
                }
            }
            Ok(Err(e)) => {
                log::error!("Processing failed with error: {e}");
                exit_code = exit_code_for(&e);
            }
            Err(_) => {
                log::error!("Failed to join a worker thread!");
                exit_code = 1;
            }
        }
    }

    for bar in bars.values() {
        bar.finish();
    }
    log::info!("Done.");
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
