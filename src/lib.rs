//! ezExp — a trial-sequencing and timing toolkit for human-subject experiments.
//!
//! An [`Experiment`](experiment::Experiment) loads the trials of one
//! participant from a delimited input file, hands them out strictly in order,
//! and appends each completed trial's parameters, results, and timer
//! durations to an output record. A [`Session`](session::Session) wraps one
//! experiment run end to end.
//!
//! The host application (GUI, device layer, scheduler) is an external
//! collaborator: it decides *when* to start and end trials; this crate owns
//! the state, the bookkeeping, and the record formats.

pub mod config;
pub mod experiment;
pub mod model;
pub mod session;
pub mod storage;
