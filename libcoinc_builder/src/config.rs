use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::ConfigError;
use super::queue::QueueConfig;

/// Structure representing the application configuration. Contains pathing,
/// run range and queue settings.
/// Configs are serializable and deserializable to YAML using serde and
/// serde_yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory containing the run files (`run_NNNN.dat`).
    pub data_path: PathBuf,
    /// Optional YAML variables dump; identity defaults when absent.
    pub variables_path: Option<PathBuf>,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
    /// Coincidence window, microseconds.
    pub coincidence_window_us: f64,
    /// Maximum buffered time span before the queue drains, seconds.
    pub max_buffered_sec: f64,
    /// Flush deadline at run stop, seconds. Negative blocks until empty.
    pub flush_timeout_sec: f64,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid.
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            variables_path: None,
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
            coincidence_window_us: DEFAULT_COINC_WINDOW_US,
            max_buffered_sec: DEFAULT_MAX_BUFFERED_SEC,
            flush_timeout_sec: DEFAULT_FLUSH_TIMEOUT_SEC,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check if a specific run exists
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.get_run_file(run_number).exists()
    }

    /// Path to a run's event file
    pub fn get_run_file(&self, run_number: i32) -> PathBuf {
        self.data_path
            .join(format!("{}.dat", self.get_run_str(run_number)))
    }

    /// Construct the run string using the frontend's file naming
    fn get_run_str(&self, run_number: i32) -> String {
        format!("run_{run_number:0>4}")
    }

    /// Queue settings in ticks, derived from the physical units here.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            window: us_to_ticks(self.coincidence_window_us),
            max_span: sec_to_ticks(self.max_buffered_sec),
            max_events: DEFAULT_MAX_QUEUED_EVENTS,
        }
    }

    /// Flush deadline for run stop; `None` means drain to empty.
    pub fn flush_timeout(&self) -> Option<f64> {
        if self.flush_timeout_sec < 0.0 {
            None
        } else {
            Some(self.flush_timeout_sec)
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn has_variables(&self) -> bool {
        self.variables_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip() {
        let config = Config {
            data_path: PathBuf::from("/data/runs"),
            variables_path: Some(PathBuf::from("/data/vars.yaml")),
            first_run_number: 10,
            last_run_number: 12,
            n_threads: 2,
            coincidence_window_us: 5.0,
            max_buffered_sec: 2.0,
            flush_timeout_sec: -1.0,
        };
        let text = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.data_path, config.data_path);
        assert_eq!(back.coincidence_window_us, 5.0);
        assert!(back.flush_timeout().is_none());
    }

    #[test]
    fn run_file_naming() {
        let config = Config {
            data_path: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(
            config.get_run_file(7),
            PathBuf::from("/data/run_0007.dat")
        );
        assert_eq!(
            config.get_run_file(1234),
            PathBuf::from("/data/run_1234.dat")
        );
    }

    #[test]
    fn queue_config_units() {
        let config = Config {
            coincidence_window_us: 10.0,
            max_buffered_sec: 1.0,
            ..Default::default()
        };
        let qc = config.queue_config();
        assert_eq!(qc.window, 10_000);
        assert_eq!(qc.max_span, CLOCK_HZ);
    }
}
