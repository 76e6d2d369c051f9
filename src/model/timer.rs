//! Trial timing: a pause/resume-aware stopwatch.
//!
//! Pauses and resumes are recorded as an ordered list of "break" timestamps.
//! The parity of that list is the paused/running flag: an odd count means the
//! timer is currently paused. Complete (pause, resume) pairs are excluded
//! from the duration.
//!
//! A trailing unmatched pause is *not* charged against the duration: a timer
//! stopped while still paused accrues time up to the stop. Hosts that want a
//! break excluded must resume before stopping. This matches the recorded
//! data of existing experiment logs, so it is kept as-is.

use jiff::{SignedDuration, Timestamp};

use super::TemporalState;

/// Errors from timer state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("timer not started")]
    NotStarted,

    #[error("timer already started")]
    AlreadyStarted,

    #[error("timer already ended")]
    AlreadyEnded,
}

type Result<T> = core::result::Result<T, TimerError>;

/// A stopwatch owned by a trial.
///
/// Lifecycle: `NotStarted` → [`start`](Timer::start) → `Started` →
/// [`stop`](Timer::stop) → `Ended`. Duration queries are live until the
/// timer is stopped; after that the end timestamp freezes the result.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    state: TemporalState,
    started_at: Option<Timestamp>,
    ended_at: Option<Timestamp>,
    breaks: Vec<Timestamp>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TemporalState {
        self.state
    }

    /// Whether the timer is currently paused (odd number of breaks).
    pub fn is_paused(&self) -> bool {
        self.breaks.len() % 2 == 1
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<Timestamp> {
        self.ended_at
    }

    /// Starts the timer at the current time.
    pub fn start(&mut self) -> Result<()> {
        self.start_at(Timestamp::now())
    }

    /// Starts the timer at an explicit timestamp.
    pub fn start_at(&mut self, now: Timestamp) -> Result<()> {
        match self.state {
            TemporalState::Started => Err(TimerError::AlreadyStarted),
            TemporalState::Ended => Err(TimerError::AlreadyEnded),
            TemporalState::NotStarted => {
                self.started_at = Some(now);
                self.state = TemporalState::Started;
                Ok(())
            }
        }
    }

    /// Pauses the timer.
    ///
    /// Returns `Ok(false)` without recording anything if the timer is
    /// already paused — the caller may warn, but it is not a failure.
    pub fn pause(&mut self) -> Result<bool> {
        self.pause_at(Timestamp::now())
    }

    /// Pauses the timer at an explicit timestamp.
    pub fn pause_at(&mut self, now: Timestamp) -> Result<bool> {
        self.ensure_running()?;
        if self.is_paused() {
            return Ok(false);
        }
        self.breaks.push(now);
        Ok(true)
    }

    /// Resumes the timer.
    ///
    /// Returns `Ok(false)` without recording anything if the timer is not
    /// paused.
    pub fn resume(&mut self) -> Result<bool> {
        self.resume_at(Timestamp::now())
    }

    /// Resumes the timer at an explicit timestamp.
    pub fn resume_at(&mut self, now: Timestamp) -> Result<bool> {
        self.ensure_running()?;
        if !self.is_paused() {
            return Ok(false);
        }
        self.breaks.push(now);
        Ok(true)
    }

    /// Stops the timer and freezes its duration.
    ///
    /// Valid from any non-ended state; a timer stopped before ever being
    /// started has a zero duration.
    pub fn stop(&mut self) -> Result<()> {
        self.stop_at(Timestamp::now())
    }

    /// Stops the timer at an explicit timestamp.
    pub fn stop_at(&mut self, now: Timestamp) -> Result<()> {
        if self.state == TemporalState::Ended {
            return Err(TimerError::AlreadyEnded);
        }
        self.ended_at = Some(now);
        self.state = TemporalState::Ended;
        Ok(())
    }

    /// Returns the timer to its initial empty state, whatever it was doing.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Elapsed duration, excluding completed pause/resume breaks.
    ///
    /// Live while the timer runs; frozen at the end timestamp once stopped.
    pub fn duration(&self) -> SignedDuration {
        self.duration_at(Timestamp::now())
    }

    /// Elapsed duration as of an explicit timestamp.
    pub fn duration_at(&self, now: Timestamp) -> SignedDuration {
        let Some(start) = self.started_at else {
            return SignedDuration::ZERO;
        };
        let end = match self.state {
            TemporalState::Ended => self.ended_at.unwrap_or(now),
            _ => now,
        };
        let mut duration = end.duration_since(start);
        // chunks_exact skips a trailing unmatched pause, which is exactly
        // the documented policy: that break is never subtracted.
        for pair in self.breaks.chunks_exact(2) {
            duration -= pair[1].duration_since(pair[0]);
        }
        duration
    }

    /// Elapsed duration in fractional milliseconds.
    pub fn raw_duration(&self) -> f64 {
        self.raw_duration_at(Timestamp::now())
    }

    /// Elapsed duration in fractional milliseconds as of a timestamp.
    pub fn raw_duration_at(&self, now: Timestamp) -> f64 {
        self.duration_at(now).as_secs_f64() * 1000.0
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state {
            TemporalState::NotStarted => Err(TimerError::NotStarted),
            TemporalState::Ended => Err(TimerError::AlreadyEnded),
            TemporalState::Started => Ok(()),
        }
    }
}
