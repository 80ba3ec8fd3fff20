//! Render a route's schedule table as prompt context.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// CSV text of a schedule, or the reason it could not be read.
///
/// A schedule that cannot be read does not stop the route: the reason is
/// embedded in the prompt in place of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSnippet {
    Table(String),
    Unavailable(String),
}

impl ScheduleSnippet {
    /// Read the schedule at `path`, keeping the header and at most `rows`
    /// data rows (`None` keeps all of them).
    pub fn read(path: &Path, rows: Option<usize>) -> Self {
        match render(path, rows) {
            Ok(table) => ScheduleSnippet::Table(table),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Schedule unavailable");
                ScheduleSnippet::Unavailable(e.to_string())
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ScheduleSnippet::Table(_))
    }
}

impl fmt::Display for ScheduleSnippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleSnippet::Table(table) => f.write_str(table),
            ScheduleSnippet::Unavailable(reason) => {
                write!(f, "Error reading schedule file: {reason}")
            }
        }
    }
}

fn render(path: &Path, rows: Option<usize>) -> Result<String, Error> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(Error::NoColumns);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(&headers)?;
    for record in reader.records().take(rows.unwrap_or(usize::MAX)) {
        let record = record?;
        // Short rows are padded with empty fields up to the header width.
        let missing = headers.len().saturating_sub(record.len());
        writer.write_record(record.iter().chain(std::iter::repeat_n("", missing)))?;
    }

    let bytes = writer.into_inner().map_err(|e| Error::Flush(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[derive(Debug, Error)]
enum Error {
    #[error("{path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("no columns to parse from file")]
    NoColumns,

    #[error("{0}")]
    Flush(std::io::Error),
}
