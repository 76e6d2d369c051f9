//! File formats for experiment data.
//!
//! Input: a delimited table, one trial per row, `#`-comments and blank
//! lines skipped, first remaining line the header.
//!
//! Output: append-only record files, one line per saved trial. CSV gets a
//! header line when the file is first created; XML gets one self-closing
//! `<trial .../>` element per trial. Lines are fully formatted before any
//! byte is written, so a failed save never leaves a partial record.

mod input;
mod output;

use std::io;
use std::path::PathBuf;

pub use input::{InputTable, read_table};
pub use output::{append_record, csv_header, csv_row, xml_element};

/// Errors that can occur while reading or writing experiment files.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no header line found in {0}")]
    MissingHeader(PathBuf),

    #[error("timer not found: {0}")]
    TimerNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;
