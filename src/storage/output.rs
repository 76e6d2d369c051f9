//! Append-only trial record writing.
//!
//! Column layout is `parameters…, results…, TaskCompletionTime, timers…`.
//! When a results header is declared, every declared name gets a column and
//! a missing result degrades to an empty field; without one, recorded
//! results are dumped in insertion order and the row width may vary.

use std::fs;
use std::path::Path;

// Trait must be in scope for `.write_all()` on File.
use std::io::Write;

use crate::model::TrialRecord;

use super::{Result, StorageError};

/// Column name for the main timer in every record format.
pub const MAIN_TIMER_COLUMN: &str = "TaskCompletionTime";

/// Appends one record line to `path`.
///
/// When the file does not exist yet it is created and `header` (if any) is
/// written first. XML records pass no header.
pub fn append_record(path: &Path, header: Option<&str>, line: &str) -> Result<()> {
    let created = !path.exists();
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = String::new();
    if created && let Some(header) = header {
        out.push_str(header);
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    file.write_all(out.as_bytes())?;
    Ok(())
}

/// Builds the CSV header line for an experiment's column layout.
pub fn csv_header(
    separator: char,
    parameters: &[String],
    results_header: Option<&[String]>,
    timers_header: Option<&[String]>,
) -> String {
    let mut columns = parameters.to_vec();
    if let Some(results) = results_header {
        columns.extend(results.iter().cloned());
    }
    columns.push(MAIN_TIMER_COLUMN.to_string());
    if let Some(timers) = timers_header {
        columns.extend(timers.iter().cloned());
    }
    columns.join(&separator.to_string())
}

/// Builds one CSV data row from a trial record.
///
/// Fails with [`StorageError::TimerNotFound`] if the timers header names a
/// timer the trial never registered.
pub fn csv_row(
    separator: char,
    record: &TrialRecord,
    results_header: Option<&[String]>,
    timers_header: Option<&[String]>,
) -> Result<String> {
    let mut fields = record.parameters.clone();
    match results_header {
        Some(names) => {
            for name in names {
                fields.push(record.result(name).unwrap_or_default().to_string());
            }
        }
        None => {
            for (_, value) in &record.results {
                fields.push(value.clone());
            }
        }
    }
    fields.push(format_ms(record.main_ms));
    if let Some(names) = timers_header {
        for name in names {
            let ms = record
                .timer_ms(name)
                .ok_or_else(|| StorageError::TimerNotFound(name.clone()))?;
            fields.push(format_ms(ms));
        }
    }
    Ok(fields.join(&separator.to_string()))
}

/// Builds one `<trial .../>` element from a trial record.
///
/// Same field set and results precedence as the CSV row, as attributes.
pub fn xml_element(
    parameter_names: &[String],
    record: &TrialRecord,
    results_header: Option<&[String]>,
    timers_header: Option<&[String]>,
) -> Result<String> {
    let mut attributes = Vec::new();
    for (name, value) in parameter_names.iter().zip(&record.parameters) {
        attributes.push(attribute(name, value));
    }
    match results_header {
        Some(names) => {
            for name in names {
                attributes.push(attribute(name, record.result(name).unwrap_or_default()));
            }
        }
        None => {
            for (name, value) in &record.results {
                attributes.push(attribute(name, value));
            }
        }
    }
    attributes.push(attribute(MAIN_TIMER_COLUMN, &format_ms(record.main_ms)));
    if let Some(names) = timers_header {
        for name in names {
            let ms = record
                .timer_ms(name)
                .ok_or_else(|| StorageError::TimerNotFound(name.clone()))?;
            attributes.push(attribute(name, &format_ms(ms)));
        }
    }
    Ok(format!("<trial {}/>", attributes.join(" ")))
}

fn attribute(name: &str, value: &str) -> String {
    format!("{name}=\"{}\"", escape_xml(value))
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Durations are persisted as fractional milliseconds, three decimals.
fn format_ms(ms: f64) -> String {
    format!("{ms:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn sample_record() -> TrialRecord {
        TrialRecord {
            parameters: vec!["P1".into(), "5".into()],
            results: vec![("Score".into(), "42".into())],
            main_ms: 1234.5,
            timers: vec![("reaction".into(), 88.25)],
        }
    }

    #[test]
    fn header_written_only_on_creation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        append_record(&path, Some("a,b"), "1,2").unwrap();
        append_record(&path, Some("a,b"), "3,4").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn no_header_for_headerless_formats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.xml");

        append_record(&path, None, "<trial/>").unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "<trial/>\n");
    }

    #[test]
    fn csv_header_layout() {
        let parameters = vec!["Participant".to_string(), "X".to_string()];
        let results = vec!["Score".to_string()];
        let timers = vec!["reaction".to_string()];

        assert_eq!(
            csv_header(',', &parameters, Some(&results), Some(&timers)),
            "Participant,X,Score,TaskCompletionTime,reaction"
        );
        assert_eq!(
            csv_header(',', &parameters, None, None),
            "Participant,X,TaskCompletionTime"
        );
    }

    #[test]
    fn csv_row_with_declared_results_is_fixed_width() {
        let mut record = sample_record();
        record.results.clear();
        let results = vec!["Score".to_string(), "Errors".to_string()];

        let row = csv_row(',', &record, Some(&results), None).unwrap();
        // Declared but unset results degrade to empty fields.
        assert_eq!(row, "P1,5,,,1234.500");
    }

    #[test]
    fn csv_row_without_header_dumps_results_in_order() {
        let mut record = sample_record();
        record.results.push(("Errors".into(), "0".into()));

        let row = csv_row(',', &record, None, None).unwrap();
        assert_eq!(row, "P1,5,42,0,1234.500");
    }

    #[test]
    fn csv_row_appends_declared_timers() {
        let record = sample_record();
        let timers = vec!["reaction".to_string()];

        let row = csv_row(',', &record, None, Some(&timers)).unwrap();
        assert_eq!(row, "P1,5,42,1234.500,88.250");
    }

    #[test]
    fn csv_row_unknown_timer_fails() {
        let record = sample_record();
        let timers = vec!["ghost".to_string()];

        let err = csv_row(',', &record, None, Some(&timers)).unwrap_err();
        assert!(matches!(err, StorageError::TimerNotFound(name) if name == "ghost"));
    }

    #[test]
    fn xml_element_shape() {
        let record = sample_record();
        let parameters = vec!["Participant".to_string(), "X".to_string()];
        let results = vec!["Score".to_string()];
        let timers = vec!["reaction".to_string()];

        let element =
            xml_element(&parameters, &record, Some(&results), Some(&timers)).unwrap();
        assert_eq!(
            element,
            "<trial Participant=\"P1\" X=\"5\" Score=\"42\" \
             TaskCompletionTime=\"1234.500\" reaction=\"88.250\"/>"
        );
    }

    #[test]
    fn xml_attribute_values_escaped() {
        let mut record = sample_record();
        record.results[0].1 = "a<b & \"c\"".into();
        let parameters = vec!["Participant".to_string(), "X".to_string()];

        let element = xml_element(&parameters, &record, None, None).unwrap();
        assert!(element.contains("Score=\"a&lt;b &amp; &quot;c&quot;\""));
    }
}
