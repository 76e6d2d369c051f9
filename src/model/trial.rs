//! A trial: one row of experiment input plus everything recorded while the
//! participant performs it.
//!
//! Parameter values are positional; their names live in the owning
//! experiment's header and are shared with each trial so lookups by name
//! work on either side. Results and named timers are recorded at runtime.
//! The always-present main timer spans the whole started-to-ended interval.

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};

use super::{TemporalState, Timer, TimerError};

/// Errors from trial operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrialError {
    #[error("trial already started")]
    AlreadyStarted,

    #[error("trial already ended")]
    AlreadyEnded,

    #[error("trial not started")]
    NotStarted,

    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("result not found: {0}")]
    ResultNotFound(String),

    #[error("timer not found: {0}")]
    TimerNotFound(String),

    #[error("timer already exists: {0}")]
    TimerAlreadyExists(String),

    #[error(transparent)]
    Timer(#[from] TimerError),
}

type Result<T> = core::result::Result<T, TrialError>;

/// One unit of experimental work.
///
/// Created by the experiment at load time with its parameter values fixed;
/// everything else (results, timers, lifecycle state) is recorded as the
/// host drives the trial.
#[derive(Debug, Clone)]
pub struct Trial {
    parameter_names: Arc<[String]>,
    parameter_values: Vec<String>,
    // Insertion-ordered: the dump-all output path preserves first-write order.
    results: Vec<(String, String)>,
    main_timer: Timer,
    timers: Vec<(String, Timer)>,
    state: TemporalState,
}

impl Trial {
    /// Creates a trial with fixed parameter values.
    ///
    /// `parameter_names` is the experiment's header, shared across all of
    /// its trials.
    pub fn new(parameter_names: Arc<[String]>, parameter_values: Vec<String>) -> Self {
        Self {
            parameter_names,
            parameter_values,
            results: Vec::new(),
            main_timer: Timer::new(),
            timers: Vec::new(),
            state: TemporalState::NotStarted,
        }
    }

    pub fn state(&self) -> TemporalState {
        self.state
    }

    // ── Parameters ──

    /// Looks up a parameter value by its header name.
    ///
    /// A row shorter than the header yields an empty value for the missing
    /// trailing columns.
    pub fn parameter(&self, name: &str) -> Result<&str> {
        let index = self
            .parameter_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| TrialError::ParameterNotFound(name.to_string()))?;
        Ok(self.parameter_values.get(index).map_or("", String::as_str))
    }

    /// All parameter values in header order (defensive copy).
    pub fn parameters(&self) -> Vec<String> {
        self.parameter_values.clone()
    }

    // ── Results ──

    /// Records a result value under a name, overwriting any previous value.
    ///
    /// Returns whether the key already existed (`true` = overwrite).
    pub fn set_result(&mut self, name: &str, value: &str) -> bool {
        if let Some(entry) = self.results.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value.to_string();
            true
        } else {
            self.results.push((name.to_string(), value.to_string()));
            false
        }
    }

    /// Looks up a recorded result by name.
    pub fn result(&self, name: &str) -> Result<&str> {
        self.results
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| TrialError::ResultNotFound(name.to_string()))
    }

    /// All recorded results in insertion order (defensive copy).
    pub fn results(&self) -> Vec<(String, String)> {
        self.results.clone()
    }

    // ── Named timers ──

    /// Registers a fresh timer under a name.
    pub fn add_timer(&mut self, name: &str) -> Result<()> {
        if self.timers.iter().any(|(n, _)| n == name) {
            return Err(TrialError::TimerAlreadyExists(name.to_string()));
        }
        self.timers.push((name.to_string(), Timer::new()));
        Ok(())
    }

    /// Removes a named timer; returns whether it existed.
    pub fn remove_timer(&mut self, name: &str) -> bool {
        let before = self.timers.len();
        self.timers.retain(|(n, _)| n != name);
        self.timers.len() != before
    }

    /// Borrows a named timer.
    pub fn timer(&self, name: &str) -> Result<&Timer> {
        self.timers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
            .ok_or_else(|| TrialError::TimerNotFound(name.to_string()))
    }

    fn timer_mut(&mut self, name: &str) -> Result<&mut Timer> {
        self.timers
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
            .ok_or_else(|| TrialError::TimerNotFound(name.to_string()))
    }

    pub fn start_timer(&mut self, name: &str) -> Result<()> {
        self.start_timer_at(name, Timestamp::now())
    }

    pub fn start_timer_at(&mut self, name: &str, now: Timestamp) -> Result<()> {
        Ok(self.timer_mut(name)?.start_at(now)?)
    }

    /// Pauses a named timer; `Ok(false)` if it was already paused.
    pub fn pause_timer(&mut self, name: &str) -> Result<bool> {
        self.pause_timer_at(name, Timestamp::now())
    }

    pub fn pause_timer_at(&mut self, name: &str, now: Timestamp) -> Result<bool> {
        Ok(self.timer_mut(name)?.pause_at(now)?)
    }

    /// Resumes a named timer; `Ok(false)` if it was not paused.
    pub fn resume_timer(&mut self, name: &str) -> Result<bool> {
        self.resume_timer_at(name, Timestamp::now())
    }

    pub fn resume_timer_at(&mut self, name: &str, now: Timestamp) -> Result<bool> {
        Ok(self.timer_mut(name)?.resume_at(now)?)
    }

    pub fn stop_timer(&mut self, name: &str) -> Result<()> {
        self.stop_timer_at(name, Timestamp::now())
    }

    pub fn stop_timer_at(&mut self, name: &str, now: Timestamp) -> Result<()> {
        Ok(self.timer_mut(name)?.stop_at(now)?)
    }

    /// A named timer's duration in fractional milliseconds.
    pub fn timer_raw_duration(&self, name: &str) -> Result<f64> {
        Ok(self.timer(name)?.raw_duration())
    }

    /// A named timer's duration.
    pub fn timer_duration(&self, name: &str) -> Result<SignedDuration> {
        Ok(self.timer(name)?.duration())
    }

    /// Names of all registered timers, in registration order.
    pub fn timer_names(&self) -> Vec<String> {
        self.timers.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn main_timer(&self) -> &Timer {
        &self.main_timer
    }

    /// The main timer's duration in fractional milliseconds.
    pub fn main_raw_duration(&self) -> f64 {
        self.main_timer.raw_duration()
    }

    /// The main timer's duration.
    pub fn main_duration(&self) -> SignedDuration {
        self.main_timer.duration()
    }

    // ── Lifecycle ──

    /// Starts the trial and its main timer.
    pub fn start(&mut self) -> Result<()> {
        self.start_at(Timestamp::now())
    }

    /// Starts the trial at an explicit timestamp.
    pub fn start_at(&mut self, now: Timestamp) -> Result<()> {
        match self.state {
            TemporalState::Started => Err(TrialError::AlreadyStarted),
            TemporalState::Ended => Err(TrialError::AlreadyEnded),
            TemporalState::NotStarted => {
                self.state = TemporalState::Started;
                self.main_timer.start_at(now)?;
                Ok(())
            }
        }
    }

    /// Ends the trial: stops the main timer and every still-running named
    /// timer.
    pub fn end(&mut self) -> Result<()> {
        self.end_at(Timestamp::now())
    }

    /// Ends the trial at an explicit timestamp.
    pub fn end_at(&mut self, now: Timestamp) -> Result<()> {
        match self.state {
            TemporalState::NotStarted => Err(TrialError::NotStarted),
            TemporalState::Ended => Err(TrialError::AlreadyEnded),
            TemporalState::Started => {
                self.state = TemporalState::Ended;
                self.main_timer.stop_at(now)?;
                for (_, timer) in &mut self.timers {
                    if timer.state() == TemporalState::Started {
                        timer.stop_at(now)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Returns the trial to its not-started state so it can run again.
    ///
    /// The main timer is always reset; named timers are reset only if they
    /// were running.
    pub fn reset(&mut self) {
        self.state = TemporalState::NotStarted;
        self.main_timer.reset();
        for (_, timer) in &mut self.timers {
            if timer.state() == TemporalState::Started {
                timer.reset();
            }
        }
    }

    // ── Serialization ──

    /// Snapshot for persistence: defensive copies of everything the record
    /// formats need. Internal storage is never exposed by reference.
    pub fn record(&self) -> TrialRecord {
        self.record_at(Timestamp::now())
    }

    /// Snapshot as of an explicit timestamp (durations of any still-running
    /// timer are computed against it).
    pub fn record_at(&self, now: Timestamp) -> TrialRecord {
        TrialRecord {
            parameters: self.parameter_values.clone(),
            results: self.results.clone(),
            main_ms: self.main_timer.raw_duration_at(now),
            timers: self
                .timers
                .iter()
                .map(|(n, t)| (n.clone(), t.raw_duration_at(now)))
                .collect(),
        }
    }
}

/// A persisted view of one trial.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    /// Parameter values in header order.
    pub parameters: Vec<String>,

    /// Results in insertion order.
    pub results: Vec<(String, String)>,

    /// Main timer duration, fractional milliseconds.
    pub main_ms: f64,

    /// Named timer durations, fractional milliseconds.
    pub timers: Vec<(String, f64)>,
}

impl TrialRecord {
    pub fn result(&self, name: &str) -> Option<&str> {
        self.results
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn timer_ms(&self, name: &str) -> Option<f64> {
        self.timers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ms)| *ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millisecond(ms).unwrap()
    }

    fn names(list: &[&str]) -> Arc<[String]> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn sample_trial() -> Trial {
        Trial::new(
            names(&["Participant", "Block", "Target"]),
            vec!["P1".into(), "2".into(), "left".into()],
        )
    }

    #[test]
    fn parameter_lookup_by_name() {
        let trial = sample_trial();
        assert_eq!(trial.parameter("Target").unwrap(), "left");
        assert_eq!(trial.parameter("Participant").unwrap(), "P1");

        let err = trial.parameter("Nope").unwrap_err();
        assert_eq!(err, TrialError::ParameterNotFound("Nope".into()));
    }

    #[test]
    fn short_row_yields_empty_trailing_parameters() {
        let trial = Trial::new(names(&["Participant", "Block"]), vec!["P1".into()]);
        assert_eq!(trial.parameter("Block").unwrap(), "");
    }

    #[test]
    fn set_result_reports_whether_key_existed() {
        let mut trial = sample_trial();
        assert!(!trial.set_result("Score", "10"));
        assert!(trial.set_result("Score", "42"));
        assert_eq!(trial.result("Score").unwrap(), "42");
    }

    #[test]
    fn results_keep_insertion_order() {
        let mut trial = sample_trial();
        trial.set_result("B", "2");
        trial.set_result("A", "1");
        trial.set_result("B", "3");

        let results = trial.results();
        assert_eq!(results[0], ("B".to_string(), "3".to_string()));
        assert_eq!(results[1], ("A".to_string(), "1".to_string()));
    }

    #[test]
    fn missing_result_fails() {
        let trial = sample_trial();
        let err = trial.result("Score").unwrap_err();
        assert_eq!(err, TrialError::ResultNotFound("Score".into()));
    }

    #[test]
    fn duplicate_timer_fails() {
        let mut trial = sample_trial();
        trial.add_timer("reaction").unwrap();
        let err = trial.add_timer("reaction").unwrap_err();
        assert_eq!(err, TrialError::TimerAlreadyExists("reaction".into()));
    }

    #[test]
    fn remove_timer_reports_removal() {
        let mut trial = sample_trial();
        trial.add_timer("reaction").unwrap();
        assert!(trial.remove_timer("reaction"));
        assert!(!trial.remove_timer("reaction"));
    }

    #[test]
    fn unknown_timer_operations_fail() {
        let mut trial = sample_trial();
        let err = trial.start_timer_at("ghost", ts(0)).unwrap_err();
        assert_eq!(err, TrialError::TimerNotFound("ghost".into()));
        assert!(trial.timer_raw_duration("ghost").is_err());
    }

    #[test]
    fn lifecycle_double_start_fails() {
        let mut trial = sample_trial();
        trial.start_at(ts(0)).unwrap();
        assert_eq!(trial.start_at(ts(1)).unwrap_err(), TrialError::AlreadyStarted);
    }

    #[test]
    fn end_before_start_fails() {
        let mut trial = sample_trial();
        assert_eq!(trial.end_at(ts(0)).unwrap_err(), TrialError::NotStarted);
    }

    #[test]
    fn end_twice_fails() {
        let mut trial = sample_trial();
        trial.start_at(ts(0)).unwrap();
        trial.end_at(ts(10)).unwrap();
        assert_eq!(trial.end_at(ts(20)).unwrap_err(), TrialError::AlreadyEnded);
    }

    #[test]
    fn end_stops_running_timers() {
        let mut trial = sample_trial();
        trial.add_timer("reaction").unwrap();
        trial.add_timer("untouched").unwrap();

        trial.start_at(ts(0)).unwrap();
        trial.start_timer_at("reaction", ts(100)).unwrap();
        trial.end_at(ts(400)).unwrap();

        assert_eq!(trial.timer("reaction").unwrap().state(), TemporalState::Ended);
        assert_eq!(
            trial.timer("untouched").unwrap().state(),
            TemporalState::NotStarted
        );

        let record = trial.record_at(ts(400));
        assert!((record.main_ms - 400.0).abs() < f64::EPSILON);
        assert!((record.timer_ms("reaction").unwrap() - 300.0).abs() < f64::EPSILON);
        assert_eq!(record.timer_ms("untouched").unwrap(), 0.0);
    }

    #[test]
    fn reset_allows_rerun() {
        let mut trial = sample_trial();
        trial.add_timer("reaction").unwrap();
        trial.start_at(ts(0)).unwrap();
        trial.start_timer_at("reaction", ts(10)).unwrap();

        trial.reset();
        assert_eq!(trial.state(), TemporalState::NotStarted);
        assert_eq!(
            trial.timer("reaction").unwrap().state(),
            TemporalState::NotStarted
        );

        trial.start_at(ts(100)).unwrap();
        trial.end_at(ts(150)).unwrap();
        assert!((trial.record_at(ts(150)).main_ms - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn record_is_a_defensive_copy() {
        let mut trial = sample_trial();
        trial.set_result("Score", "1");

        let mut record = trial.record_at(ts(0));
        record.parameters[0] = "tampered".into();
        record.results[0].1 = "tampered".into();

        assert_eq!(trial.parameter("Participant").unwrap(), "P1");
        assert_eq!(trial.result("Score").unwrap(), "1");
    }
}
