use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::SinkError;
use crate::model::JudgmentRow;
use crate::schema::CandidateSchema;
use crate::table::{format_csv_row, parse_csv};
use crate::util::ensure_parent_directory;

/// Append-only destination for judgments.
///
/// Implementations must not return `Ok` until the row is durable. Delivery is
/// at least once: a `SinkError::Write` raised while flushing may leave the row
/// on disk, so a retried append can duplicate it.
pub trait JudgmentSink {
    fn append(&mut self, row: &JudgmentRow) -> Result<(), SinkError>;
}

/// Judgment log backed by a UTF-8 CSV file.
#[derive(Debug)]
pub struct CsvResultSink {
    path: PathBuf,
    header: Vec<String>,
    rows_written: usize,
    // Existing file whose last line lacks its terminator.
    unterminated: bool,
}

impl CsvResultSink {
    /// Prepares the destination without creating it. An existing, non-empty
    /// file must carry the schema's header.
    pub fn open(path: &Path, schema: &CandidateSchema) -> Result<Self, SinkError> {
        let header = schema.output_header();
        let mut unterminated = false;

        if let Some(found) = read_existing_header(path)? {
            if found != header {
                return Err(SinkError::HeaderMismatch {
                    path: path.to_path_buf(),
                    found: found.join(","),
                });
            }
            unterminated = !ends_with_newline(path)?;
            info!(path = %path.display(), unterminated, "appending to existing results file");
        } else {
            info!(path = %path.display(), "results file will be created on first judgment");
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            rows_written: 0,
            unterminated,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn write_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl JudgmentSink for CsvResultSink {
    fn append(&mut self, row: &JudgmentRow) -> Result<(), SinkError> {
        let expected = self.header.len() - 2;
        if row.labels.len() != expected {
            return Err(SinkError::Width {
                expected,
                found: row.labels.len(),
            });
        }

        ensure_parent_directory(&self.path).map_err(|err| self.write_error(err))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.write_error(err))?;
        let needs_header = file
            .metadata()
            .map_err(|err| self.write_error(err))?
            .len()
            == 0;

        let mut payload = String::new();
        if needs_header {
            payload.push_str(&format_csv_row(&self.header));
        } else if self.unterminated {
            payload.push('\n');
        }
        payload.push_str(&format_csv_row(&row.cells()));

        file.write_all(payload.as_bytes())
            .map_err(|err| self.write_error(err))?;
        self.unterminated = false;
        file.sync_data().map_err(|err| self.write_error(err))?;

        self.rows_written += 1;
        debug!(
            path = %self.path.display(),
            kind = %row.kind,
            wrote_header = needs_header,
            "appended judgment"
        );

        Ok(())
    }
}

fn read_existing_header(path: &Path) -> Result<Option<Vec<String>>, SinkError> {
    let read_error = |source| SinkError::Write {
        path: path.to_path_buf(),
        source,
    };

    if !path.exists() {
        return Ok(None);
    }
    if fs::metadata(path).map_err(read_error)?.len() == 0 {
        return Ok(None);
    }

    let mut line = String::new();
    BufReader::new(File::open(path).map_err(read_error)?)
        .read_line(&mut line)
        .map_err(read_error)?;

    let header = parse_csv(&line)
        .ok()
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default();
    Ok(Some(header))
}

fn ends_with_newline(path: &Path) -> Result<bool, SinkError> {
    let read_error = |source| SinkError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_error)?;
    file.seek(SeekFrom::End(-1)).map_err(read_error)?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last).map_err(read_error)?;
    Ok(last[0] == b'\n')
}

/// In-memory sink for tests; can be switched to fail every append.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rows: Vec<JudgmentRow>,
    pub fail: bool,
}

#[cfg(test)]
impl JudgmentSink for MemorySink {
    fn append(&mut self, row: &JudgmentRow) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Write {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.rows.push(row.clone());
        Ok(())
    }
}
