//! Runtime configuration, loaded from JSON so timings and endpoints can be
//! tuned without recompiling.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durations of one trial cycle, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long the clock face stays visible.
    pub show_duration_ms: u64,
    /// Length of the hidden period between two visible periods.
    pub hide_duration_ms: u64,
    /// The cue sounds this long before the clock appears.
    pub beep_lead_ms: u64,
    /// Delay between hiding the clock and asking the question.
    pub ask_delay_ms: u64,
    /// Delay between the last question and finishing the set.
    pub end_delay_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            show_duration_ms: 2000,
            hide_duration_ms: 8000,
            beep_lead_ms: 500,
            ask_delay_ms: 3000,
            end_delay_ms: 15000,
            tick_interval_ms: 1000,
        }
    }
}

impl TimingConfig {
    /// Delay from entering Hidden until the cue. A lead longer than the
    /// hidden period sounds the cue immediately.
    pub fn cue_delay_ms(&self) -> u64 {
        self.hide_duration_ms.saturating_sub(self.beep_lead_ms)
    }
}

/// Where finished sessions and clock probes go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub audio_upload_url: String,
    pub text_upload_url: String,
    pub log_upload_url: String,
    pub time_url: String,
    pub request_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            audio_upload_url: "http://localhost:8080/api/upload_audio.php".to_string(),
            text_upload_url: "http://localhost:8080/api/upload_text_sample.php".to_string(),
            log_upload_url: "http://localhost:8080/api/upload_flag.php".to_string(),
            time_url: "http://localhost:8080/api/time.php".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl EndpointConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub timing: TimingConfig,
    pub total_sets: u32,
    /// Pause between the end of one set and the start of the next.
    pub inter_set_pause_ms: u64,
    pub endpoints: EndpointConfig,
    /// Failed uploads are written here when `auto_download_on_upload_fail`
    /// is on.
    pub fallback_dir: PathBuf,
    pub auto_download_on_upload_fail: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            total_sets: 2,
            inter_set_pause_ms: 3000,
            endpoints: EndpointConfig::default(),
            fallback_dir: PathBuf::from("clockex-pending"),
            auto_download_on_upload_fail: true,
        }
    }
}

impl ExperimentConfig {
    /// Reads and parses a config file, reporting what went wrong.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like `from_file`, but a missing or invalid file falls back to the
    /// defaults with a warning.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => {
                tracing::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                tracing::warn!("[Config] {err}. Using defaults.");
                Self::default()
            }
        }
    }
}
