//! A session: one participant's sitting, from first trial to last.
//!
//! The session wraps an [`Experiment`] with identity and bookkeeping — a
//! unique id, wall-clock start and end, and a completed-trial count — and
//! can write a JSON summary next to the trial records so a run leaves a
//! self-describing trace even when the sitting is cut short.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::experiment::Experiment;

/// Errors from session bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to write session summary: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode session summary: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, SessionError>;

/// One participant's sitting.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: Timestamp,
    ended_at: Option<Timestamp>,
    trials_completed: usize,
    experiment: Experiment,
}

impl Session {
    /// Opens a session around a loaded experiment, stamped with the current
    /// time.
    pub fn new(experiment: Experiment) -> Self {
        Self::new_at(experiment, Timestamp::now())
    }

    /// Opens a session stamped with an explicit start time.
    pub fn new_at(experiment: Experiment, started_at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            ended_at: None,
            trials_completed: 0,
            experiment,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<Timestamp> {
        self.ended_at
    }

    pub fn trials_completed(&self) -> usize {
        self.trials_completed
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn experiment_mut(&mut self) -> &mut Experiment {
        &mut self.experiment
    }

    /// Counts one more trial as completed. Call after each successful
    /// trial end.
    pub fn record_completion(&mut self) {
        self.trials_completed += 1;
    }

    /// Closes the session at the current time.
    pub fn finish(&mut self) {
        self.finish_at(Timestamp::now());
    }

    /// Closes the session at an explicit time. Idempotent: the first end
    /// time wins.
    pub fn finish_at(&mut self, now: Timestamp) {
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }

    /// Snapshot of the session for the summary file.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            participant: self.experiment.participant().to_string(),
            input: self.experiment.input_path().to_path_buf(),
            output: self.experiment.output_path().map(Path::to_path_buf),
            trials_total: self.experiment.trial_count(),
            trials_completed: self.trials_completed,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    /// Writes the summary as pretty-printed JSON to `path`.
    pub fn write_summary(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.summary())?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// What a session leaves behind besides the trial records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub participant: String,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub trials_total: usize,
    pub trials_completed: usize,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::TempDir;

    use crate::config::Config;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millisecond(ms).unwrap()
    }

    fn sample_session(dir: &TempDir) -> Session {
        let input = dir.path().join("trials.csv");
        let mut file = fs::File::create(&input).unwrap();
        file.write_all(b"Participant,Block\nP1,1\nP1,2\n").unwrap();

        let experiment = Experiment::load(input, "P1", -1, &Config::default()).unwrap();
        Session::new_at(experiment, ts(0))
    }

    #[test]
    fn fresh_session_has_no_end_and_no_completions() {
        let dir = TempDir::new().unwrap();
        let session = sample_session(&dir);

        assert_eq!(session.trials_completed(), 0);
        assert!(session.ended_at().is_none());
        assert_eq!(session.started_at(), ts(0));
    }

    #[test]
    fn completions_accumulate() {
        let dir = TempDir::new().unwrap();
        let mut session = sample_session(&dir);

        session.record_completion();
        session.record_completion();
        assert_eq!(session.trials_completed(), 2);
    }

    #[test]
    fn first_finish_wins() {
        let dir = TempDir::new().unwrap();
        let mut session = sample_session(&dir);

        session.finish_at(ts(5_000));
        session.finish_at(ts(9_000));
        assert_eq!(session.ended_at(), Some(ts(5_000)));
    }

    #[test]
    fn summary_round_trips_through_json() {
        let dir = TempDir::new().unwrap();
        let mut session = sample_session(&dir);
        session.experiment_mut().set_output_path(dir.path().join("out.csv"));
        session.record_completion();
        session.finish_at(ts(60_000));

        let path = dir.path().join("session.json");
        session.write_summary(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let summary: SessionSummary = serde_json::from_str(&contents).unwrap();
        assert_eq!(summary.id, session.id());
        assert_eq!(summary.participant, "P1");
        assert_eq!(summary.trials_total, 2);
        assert_eq!(summary.trials_completed, 1);
        assert_eq!(summary.ended_at, Some(ts(60_000)));
    }
}
