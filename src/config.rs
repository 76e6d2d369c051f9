//! Run configuration.
//!
//! Loaded from a TOML file passed on the command line; every field has a
//! usable default so a config file is optional.
//!
//! ```text
//! participant-column = "Participant"
//! separator = ","
//! results = ["Score", "Errors"]
//! timers = ["reaction"]
//! output-format = "csv"
//! save-on = "trial-end"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{OutputFormat, RecordBehavior};

/// Experiment run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Name of the input column holding participant ids.
    pub participant_column: String,

    /// Field separator for both input and CSV output.
    pub separator: char,

    /// Results header: fixes the output column layout for recorded results.
    /// When absent, results are dumped in insertion order.
    pub results: Option<Vec<String>>,

    /// Timers header: named timers to persist after the main duration.
    /// When absent, only the main timer is saved.
    pub timers: Option<Vec<String>>,

    /// Output record format.
    pub output_format: OutputFormat,

    /// When trial records are written.
    pub save_on: RecordBehavior,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            participant_column: "Participant".to_string(),
            separator: ',',
            results: None,
            timers: None,
            output_format: OutputFormat::Csv,
            save_on: RecordBehavior::SaveOnTrialEnd,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }
}
