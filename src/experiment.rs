//! Experiment sequencing: load one participant's trials, hand them out in
//! order, persist each one as it completes.
//!
//! The trial index starts "before the first trial" and only ever moves
//! forward through [`Experiment::load_next_trial`] — even
//! [`Experiment::load_trial`] rewinds and delegates to it, so a single code
//! path performs every index mutation and bounds check. An off-by-one here
//! corrupts a participant's data with no way to re-run them, which is why
//! the advance path is deliberately narrow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jiff::Timestamp;

use crate::config::Config;
use crate::model::{OutputFormat, RecordBehavior, Trial, TrialError};
use crate::storage::{self, StorageError};

/// Errors from experiment loading, sequencing, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("participant {participant:?} not found in column {column:?} of {path}")]
    ParticipantNotFound {
        participant: String,
        column: String,
        path: PathBuf,
    },

    #[error("participant column {0:?} not found in input header")]
    ParticipantColumnNotFound(String),

    #[error("starting trial {start} out of bounds for {trials} trials")]
    StartTrialOutOfBounds { start: i64, trials: usize },

    #[error("trial index {index} out of range for {trials} trials")]
    IndexOutOfRange { index: usize, trials: usize },

    #[error("no trial loaded yet")]
    TrialNotLoaded,

    /// The expected end-of-sequence signal: every trial has been handed out.
    /// Callers match on this to end the session gracefully.
    #[error("all trials have been performed")]
    AllTrialsPerformed,

    #[error("no output file path specified")]
    NoOutputPath,

    #[error(transparent)]
    Trial(#[from] TrialError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, ExperimentError>;

/// One participant's pass through the experiment design.
///
/// Constructed once per participant sitting: loads the input table, keeps
/// the rows whose participant column matches, and sequences the resulting
/// trials. Trials are immutable in structure after load; only their
/// results, timers, and lifecycle state change.
#[derive(Debug)]
pub struct Experiment {
    parameter_names: Arc<[String]>,
    results_header: Option<Vec<String>>,
    timers_header: Option<Vec<String>>,
    trials: Vec<Trial>,
    /// `None` until the first load; may reach `Some(trials.len())` once the
    /// sequence is exhausted.
    current: Option<usize>,
    input_path: PathBuf,
    participant: String,
    output_path: Option<PathBuf>,
    output_format: OutputFormat,
    record_behavior: RecordBehavior,
    separator: char,
}

impl Experiment {
    /// Loads the trials of `participant` from a delimited input file.
    ///
    /// `start_trial` is the index of the first trial the next
    /// [`load_next_trial`](Self::load_next_trial) call will return; `-1`
    /// and `0` both mean "start before the first trial". It must leave at
    /// least one trial to load.
    pub fn load(
        input: impl Into<PathBuf>,
        participant: &str,
        start_trial: i64,
        config: &Config,
    ) -> Result<Self> {
        let input = input.into();
        let table = storage::read_table(&input, config.separator)?;

        let column = table
            .header
            .iter()
            .position(|name| *name == config.participant_column)
            .ok_or_else(|| {
                ExperimentError::ParticipantColumnNotFound(config.participant_column.clone())
            })?;

        let parameter_names: Arc<[String]> = table.header.into();
        let trials: Vec<Trial> = table
            .rows
            .into_iter()
            .filter(|row| row.get(column).is_some_and(|id| id == participant))
            .map(|row| Trial::new(Arc::clone(&parameter_names), row))
            .collect();

        if trials.is_empty() {
            return Err(ExperimentError::ParticipantNotFound {
                participant: participant.to_string(),
                column: config.participant_column.clone(),
                path: input,
            });
        }
        if start_trial < -1 || start_trial >= trials.len() as i64 {
            return Err(ExperimentError::StartTrialOutOfBounds {
                start: start_trial,
                trials: trials.len(),
            });
        }

        Ok(Self {
            parameter_names,
            results_header: config.results.clone(),
            timers_header: config.timers.clone(),
            trials,
            // The next load lands on `start_trial` (or 0 for -1).
            current: usize::try_from(start_trial - 1).ok(),
            input_path: input,
            participant: participant.to_string(),
            output_path: None,
            output_format: config.output_format,
            record_behavior: config.save_on,
            separator: config.separator,
        })
    }

    // ── Accessors ──

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }

    /// Index of the currently loaded trial; `None` before the first load.
    pub fn current_trial_index(&self) -> Option<usize> {
        self.current
    }

    /// Parameter names in header order (defensive copy).
    pub fn parameters(&self) -> Vec<String> {
        self.parameter_names.to_vec()
    }

    /// All trials loaded for this participant, in file order.
    pub fn all_trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) {
        self.output_path = Some(path.into());
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.output_format = format;
    }

    pub fn set_record_behavior(&mut self, behavior: RecordBehavior) {
        self.record_behavior = behavior;
    }

    /// Fixes the output column layout for recorded results. Call before the
    /// first save to get fixed-width rows.
    pub fn set_results_header(&mut self, results: Vec<String>) {
        self.results_header = Some(results);
    }

    /// Names the timers to persist after the main duration. Timers not
    /// listed here are never saved.
    pub fn set_timers_header(&mut self, timers: Vec<String>) {
        self.timers_header = Some(timers);
    }

    // ── Sequencing ──

    /// Advances to the next trial and returns it.
    ///
    /// The sole forward-advance primitive; fails with
    /// [`ExperimentError::AllTrialsPerformed`] once the sequence is
    /// exhausted.
    pub fn load_next_trial(&mut self) -> Result<&Trial> {
        let next = match self.current {
            None => 0,
            Some(index) => index + 1,
        };
        self.current = Some(next);
        if next >= self.trials.len() {
            return Err(ExperimentError::AllTrialsPerformed);
        }
        Ok(&self.trials[next])
    }

    /// Jumps to the trial at `index`.
    ///
    /// Rewinds one short of the target and delegates to
    /// [`load_next_trial`](Self::load_next_trial) so the landing goes
    /// through the same advance path.
    pub fn load_trial(&mut self, index: usize) -> Result<&Trial> {
        if index >= self.trials.len() {
            return Err(ExperimentError::IndexOutOfRange {
                index,
                trials: self.trials.len(),
            });
        }
        self.current = index.checked_sub(1);
        self.load_next_trial()
    }

    /// The currently loaded trial.
    pub fn current_trial(&self) -> Result<&Trial> {
        match self.current {
            None => Err(ExperimentError::TrialNotLoaded),
            Some(index) if index >= self.trials.len() => {
                Err(ExperimentError::AllTrialsPerformed)
            }
            Some(index) => Ok(&self.trials[index]),
        }
    }

    fn current_trial_mut(&mut self) -> Result<&mut Trial> {
        match self.current {
            None => Err(ExperimentError::TrialNotLoaded),
            Some(index) if index >= self.trials.len() => {
                Err(ExperimentError::AllTrialsPerformed)
            }
            Some(index) => Ok(&mut self.trials[index]),
        }
    }

    // ── Current-trial operations ──

    /// Starts the current trial (and its main timer).
    pub fn start_trial(&mut self) -> Result<()> {
        self.start_trial_at(Timestamp::now())
    }

    /// Starts the current trial at an explicit timestamp.
    pub fn start_trial_at(&mut self, now: Timestamp) -> Result<()> {
        Ok(self.current_trial_mut()?.start_at(now)?)
    }

    /// Ends the current trial; with [`RecordBehavior::SaveOnTrialEnd`] the
    /// record is appended immediately.
    pub fn end_trial(&mut self) -> Result<()> {
        self.end_trial_at(Timestamp::now())
    }

    /// Ends the current trial at an explicit timestamp.
    pub fn end_trial_at(&mut self, now: Timestamp) -> Result<()> {
        self.current_trial_mut()?.end_at(now)?;
        if self.record_behavior == RecordBehavior::SaveOnTrialEnd {
            self.save_current_trial_at(now)?;
        }
        Ok(())
    }

    /// Resets the current trial so it can be run again.
    pub fn reset_trial(&mut self) -> Result<()> {
        self.current_trial_mut()?.reset();
        Ok(())
    }

    /// Looks up a parameter value on the current trial.
    pub fn parameter_data(&self, name: &str) -> Result<&str> {
        Ok(self.current_trial()?.parameter(name)?)
    }

    /// Records a result on the current trial; returns whether the key
    /// already existed.
    pub fn set_result(&mut self, name: &str, value: &str) -> Result<bool> {
        Ok(self.current_trial_mut()?.set_result(name, value))
    }

    /// Records several results on the current trial at once.
    pub fn set_results<'a>(
        &mut self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<()> {
        let trial = self.current_trial_mut()?;
        for (name, value) in pairs {
            trial.set_result(name, value);
        }
        Ok(())
    }

    /// Looks up a recorded result on the current trial.
    pub fn result(&self, name: &str) -> Result<&str> {
        Ok(self.current_trial()?.result(name)?)
    }

    /// Records the main timer's current duration as a result, so a moment
    /// within the trial can be persisted alongside ordinary results.
    pub fn set_timestamp(&mut self, name: &str) -> Result<bool> {
        self.set_timestamp_at(name, Timestamp::now())
    }

    /// Records the main timer's duration as of `now` as a result.
    pub fn set_timestamp_at(&mut self, name: &str, now: Timestamp) -> Result<bool> {
        let trial = self.current_trial_mut()?;
        let ms = trial.main_timer().raw_duration_at(now);
        Ok(trial.set_result(name, &format!("{ms:.3}")))
    }

    // ── Timer passthroughs ──

    pub fn add_timer(&mut self, name: &str) -> Result<()> {
        Ok(self.current_trial_mut()?.add_timer(name)?)
    }

    pub fn remove_timer(&mut self, name: &str) -> Result<bool> {
        Ok(self.current_trial_mut()?.remove_timer(name))
    }

    pub fn start_timer(&mut self, name: &str) -> Result<()> {
        Ok(self.current_trial_mut()?.start_timer(name)?)
    }

    /// Pauses a named timer on the current trial; `Ok(false)` if it was
    /// already paused.
    pub fn pause_timer(&mut self, name: &str) -> Result<bool> {
        Ok(self.current_trial_mut()?.pause_timer(name)?)
    }

    /// Resumes a named timer on the current trial; `Ok(false)` if it was
    /// not paused.
    pub fn resume_timer(&mut self, name: &str) -> Result<bool> {
        Ok(self.current_trial_mut()?.resume_timer(name)?)
    }

    pub fn stop_timer(&mut self, name: &str) -> Result<()> {
        Ok(self.current_trial_mut()?.stop_timer(name)?)
    }

    /// A named timer's elapsed duration on the current trial, in fractional
    /// milliseconds.
    pub fn timer_raw_duration(&self, name: &str) -> Result<f64> {
        Ok(self.current_trial()?.timer_raw_duration(name)?)
    }

    /// The main timer's elapsed duration on the current trial, in fractional
    /// milliseconds.
    pub fn main_raw_duration(&self) -> Result<f64> {
        Ok(self.current_trial()?.main_raw_duration())
    }

    // ── Persistence ──

    /// Appends the current trial's record to the output file.
    ///
    /// CSV output writes the header line when the file is first created.
    /// JSON output is not implemented; the save is skipped.
    pub fn save_current_trial(&self) -> Result<()> {
        self.save_current_trial_at(Timestamp::now())
    }

    /// Appends the current trial's record, computing any still-running
    /// timer duration against `now`.
    pub fn save_current_trial_at(&self, now: Timestamp) -> Result<()> {
        let trial = self.current_trial()?;
        let path = self.output_path.as_ref().ok_or(ExperimentError::NoOutputPath)?;
        let record = trial.record_at(now);

        match self.output_format {
            OutputFormat::Csv => {
                let header = storage::csv_header(
                    self.separator,
                    &self.parameter_names,
                    self.results_header.as_deref(),
                    self.timers_header.as_deref(),
                );
                let row = storage::csv_row(
                    self.separator,
                    &record,
                    self.results_header.as_deref(),
                    self.timers_header.as_deref(),
                )?;
                storage::append_record(path, Some(&header), &row)?;
            }
            OutputFormat::Xml => {
                let element = storage::xml_element(
                    &self.parameter_names,
                    &record,
                    self.results_header.as_deref(),
                    self.timers_header.as_deref(),
                )?;
                storage::append_record(path, None, &element)?;
            }
            OutputFormat::Json => {}
        }
        Ok(())
    }
}
