//! CLI interface for ezexp.
//!
//! Each subcommand is non-interactive: arguments in, text out.
//!
//! - `ezexp participants` — survey an input file before a study session.
//! - `ezexp inspect` — show one participant's trials without running anything.
//! - `ezexp run` — drive a whole session: every remaining trial is started,
//!   ended, and persisted, and a JSON session summary can be written at the
//!   end.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use ezexp::config::Config;
use ezexp::experiment::{Experiment, ExperimentError};
use ezexp::model::RecordBehavior;
use ezexp::session::Session;
use ezexp::storage;

/// ezexp — trial sequencing for behavioral experiments.
#[derive(Debug, Parser)]
#[command(name = "ezexp", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: running a study session
  1. ezexp participants --input design.csv
     → lists every participant id and its trial count
  2. ezexp inspect --input design.csv --participant P1
     → shows P1's trials without touching anything
  3. ezexp run --input design.csv --participant P1 \
         --output results.csv --summary session.json
     → runs every trial and appends one record per trial

Resume an interrupted session from trial 12:
  ezexp run --input design.csv --participant P1 \
      --output results.csv --start-trial 12";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the distinct participant ids in an input file, in file order.
    Participants {
        /// Input file: header row plus one row per trial.
        #[arg(long)]
        input: PathBuf,

        /// TOML configuration file (separator, participant column, ...).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show one participant's trials: the header and every parameter row.
    Inspect {
        /// Input file: header row plus one row per trial.
        #[arg(long)]
        input: PathBuf,

        /// Participant id to select rows by.
        #[arg(long)]
        participant: String,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a full session for one participant.
    ///
    /// Every remaining trial is loaded, started, ended, and (when an output
    /// file is given) appended to it. Exhausting the trial list is normal
    /// completion, not an error.
    Run {
        /// Input file: header row plus one row per trial.
        #[arg(long)]
        input: PathBuf,

        /// Participant id to run.
        #[arg(long)]
        participant: String,

        /// Output file for trial records. Without it nothing is persisted.
        #[arg(long)]
        output: Option<PathBuf>,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Index of the first trial to run; -1 starts from the beginning.
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        start_trial: i64,

        /// Write a JSON session summary to this file when the run ends.
        #[arg(long)]
        summary: Option<PathBuf>,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Command::Participants { input, config } => {
            let config = load_config(config.as_deref())?;
            cmd_participants(&input, &config)
        }
        Command::Inspect {
            input,
            participant,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            cmd_inspect(&input, &participant, &config)
        }
        Command::Run {
            input,
            participant,
            output,
            config,
            start_trial,
            summary,
        } => {
            let config = load_config(config.as_deref())?;
            cmd_run(
                &input,
                &participant,
                output.as_deref(),
                &config,
                start_trial,
                summary.as_deref(),
            )
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, String> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn cmd_participants(input: &Path, config: &Config) -> Result<(), String> {
    let table = storage::read_table(input, config.separator)
        .map_err(|e| format!("failed to read {}: {e}", input.display()))?;
    let column = table
        .header
        .iter()
        .position(|name| *name == config.participant_column)
        .ok_or_else(|| {
            format!(
                "participant column {:?} not found in {}",
                config.participant_column,
                input.display()
            )
        })?;

    let counts = participant_counts(&table.rows, column);
    if counts.is_empty() {
        println!("No trials");
        return Ok(());
    }
    for (id, count) in counts {
        println!("{id}  {count} trial(s)");
    }
    Ok(())
}

/// Distinct participant ids with trial counts, in first-seen order.
fn participant_counts(rows: &[Vec<String>], column: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in rows {
        let id = row.get(column).map_or("", String::as_str);
        if let Some(entry) = counts.iter_mut().find(|(n, _)| n == id) {
            entry.1 += 1;
        } else {
            counts.push((id.to_string(), 1));
        }
    }
    counts
}

fn cmd_inspect(input: &Path, participant: &str, config: &Config) -> Result<(), String> {
    let experiment = Experiment::load(input, participant, -1, config)
        .map_err(|e| format!("failed to load experiment: {e}"))?;

    let separator = config.separator.to_string();
    println!("{}", experiment.parameters().join(&separator));
    for trial in experiment.all_trials() {
        println!("{}", trial.parameters().join(&separator));
    }
    eprintln!(
        "{} trial(s) for participant {participant}",
        experiment.trial_count()
    );
    Ok(())
}

fn cmd_run(
    input: &Path,
    participant: &str,
    output: Option<&Path>,
    config: &Config,
    start_trial: i64,
    summary: Option<&Path>,
) -> Result<(), String> {
    let mut experiment = Experiment::load(input, participant, start_trial, config)
        .map_err(|e| format!("failed to load experiment: {e}"))?;

    match output {
        Some(path) => experiment.set_output_path(path),
        None => {
            // Without an output file an end-of-trial save would fail, so
            // persistence is turned off for the run.
            experiment.set_record_behavior(RecordBehavior::SaveOnUserDemand);
            eprintln!("No --output given; trial records will not be saved");
        }
    }

    let mut session = Session::new(experiment);
    loop {
        match session.experiment_mut().load_next_trial() {
            Ok(_) => {}
            Err(ExperimentError::AllTrialsPerformed) => break,
            Err(e) => return Err(format!("failed to load trial: {e}")),
        }

        let experiment = session.experiment_mut();
        experiment
            .start_trial()
            .map_err(|e| format!("failed to start trial: {e}"))?;
        experiment
            .end_trial()
            .map_err(|e| format!("failed to end trial: {e}"))?;
        if output.is_some() && config.save_on == RecordBehavior::SaveOnUserDemand {
            experiment
                .save_current_trial()
                .map_err(|e| format!("failed to save trial: {e}"))?;
        }
        session.record_completion();
    }
    session.finish();

    eprintln!(
        "Session {}: {} of {} trial(s) completed",
        session.id(),
        session.trials_completed(),
        session.experiment().trial_count()
    );
    if let Some(path) = summary {
        session
            .write_summary(path)
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        eprintln!("Summary written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_counts_keep_first_seen_order() {
        let rows = vec![
            vec!["P2".to_string(), "1".to_string()],
            vec!["P1".to_string(), "1".to_string()],
            vec!["P2".to_string(), "2".to_string()],
        ];
        let counts = participant_counts(&rows, 0);
        assert_eq!(
            counts,
            vec![("P2".to_string(), 2), ("P1".to_string(), 1)]
        );
    }

    #[test]
    fn short_rows_count_under_empty_id() {
        let rows = vec![vec!["P1".to_string()], vec![]];
        let counts = participant_counts(&rows, 1);
        assert_eq!(counts, vec![(String::new(), 2)]);
    }
}
