//! Delimited input reading.
//!
//! The input file defines the experiment: the header row names the
//! parameters, every following row is one trial. Lines starting with `#`
//! and blank lines are skipped anywhere in the file. Header fields are
//! trimmed; data fields are kept verbatim.

use std::fs;
use std::io;
use std::path::Path;

// Trait must be in scope for `.lines()` on BufReader.
use io::BufRead;

use super::{Result, StorageError};

/// A parsed input table: the header and the raw data rows, in file order.
#[derive(Debug, Clone)]
pub struct InputTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads a delimited table from `path`, splitting on `separator`.
pub fn read_table(path: &Path, separator: char) -> Result<InputTable> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        if header.is_none() {
            header = Some(
                line.split(separator)
                    .map(|field| field.trim().to_string())
                    .collect(),
            );
        } else {
            rows.push(line.split(separator).map(str::to_string).collect());
        }
    }

    let header = header.ok_or_else(|| StorageError::MissingHeader(path.to_path_buf()))?;
    Ok(InputTable { header, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;

    fn input_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_header_and_rows_in_order() {
        let file = input_file("Participant,Block\nP1,1\nP2,1\nP1,2\n");
        let table = read_table(file.path(), ',').unwrap();

        assert_eq!(table.header, vec!["Participant", "Block"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[2], vec!["P1", "2"]);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let file = input_file("# design file\n\nParticipant,Block\n# block one\nP1,1\n\nP1,2\n");
        let table = read_table(file.path(), ',').unwrap();

        assert_eq!(table.header, vec!["Participant", "Block"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn trims_header_fields_but_not_values() {
        let file = input_file(" Participant , Block \nP1, left\n");
        let table = read_table(file.path(), ',').unwrap();

        assert_eq!(table.header, vec!["Participant", "Block"]);
        assert_eq!(table.rows[0], vec!["P1", " left"]);
    }

    #[test]
    fn custom_separator() {
        let file = input_file("Participant;Block\nP1;1\n");
        let table = read_table(file.path(), ';').unwrap();

        assert_eq!(table.header, vec!["Participant", "Block"]);
        assert_eq!(table.rows[0], vec!["P1", "1"]);
    }

    #[test]
    fn comment_only_file_has_no_header() {
        let file = input_file("# nothing here\n\n");
        let err = read_table(file.path(), ',').unwrap_err();
        assert!(matches!(err, StorageError::MissingHeader(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_table(Path::new("/nonexistent/trials.csv"), ',').unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
