//! Core data model for ezExp: timers, trials, and the shared vocabulary
//! enums that describe their lifecycles and recording policies.

mod timer;
mod trial;

use serde::{Deserialize, Serialize};

pub use timer::{Timer, TimerError};
pub use trial::{Trial, TrialError, TrialRecord};

/// Where a timer or a trial stands in its lifecycle.
///
/// Every stateful object in the model moves strictly forward through these
/// states; only an explicit reset goes back to `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalState {
    /// Created but not yet started.
    #[default]
    NotStarted,

    /// Running (possibly paused, for timers).
    Started,

    /// Finished; terminal unless reset.
    Ended,
}

/// When trial records are written to the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordBehavior {
    /// Append the record as soon as the trial ends.
    #[default]
    #[serde(rename = "trial-end")]
    SaveOnTrialEnd,

    /// Only write when the host explicitly asks for a save.
    #[serde(rename = "demand")]
    SaveOnUserDemand,
}

/// Output record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One delimited row per trial, header written on file creation.
    #[default]
    Csv,

    /// One self-closing `<trial .../>` element per trial.
    Xml,

    /// Not implemented; saves are skipped.
    Json,
}
