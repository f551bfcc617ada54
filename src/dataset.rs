use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::LoadError;
use crate::model::{SourceLang, SourceRecord};
use crate::schema::CandidateSchema;
use crate::table::parse_csv;
use crate::util::sha256_bytes;

/// Immutable table of source records, in load order.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: CandidateSchema,
    records: Vec<SourceRecord>,
    sha256: Option<String>,
}

impl Dataset {
    pub fn load(path: &Path, schema: CandidateSchema) -> Result<Self, LoadError> {
        let raw = fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let sha256 = sha256_bytes(&raw);
        let text = String::from_utf8(raw).map_err(|err| LoadError::Malformed {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8: {err}"),
        })?;

        let mut dataset = Self::parse(path, &text, schema)?;
        dataset.sha256 = Some(sha256);

        info!(
            path = %path.display(),
            records = dataset.count(),
            candidates = dataset.schema.len(),
            "loaded dataset"
        );

        Ok(dataset)
    }

    pub fn from_records(schema: CandidateSchema, records: Vec<SourceRecord>) -> Self {
        Self {
            schema,
            records,
            sha256: None,
        }
    }

    fn parse(path: &Path, text: &str, schema: CandidateSchema) -> Result<Self, LoadError> {
        let malformed = |reason: String| LoadError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let mut rows = parse_csv(text).map_err(malformed)?.into_iter();
        let header = rows.next().ok_or_else(|| LoadError::Empty {
            path: path.to_path_buf(),
        })?;

        let columns: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim(), index))
            .collect();
        let column = |name: &str| -> Result<usize, LoadError> {
            columns
                .get(name)
                .copied()
                .ok_or_else(|| LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };

        let source_col = column("source")?;
        let lang_col = column("source_lang")?;
        let corpus_col = column("corpus_type")?;
        let candidate_cols = schema
            .names()
            .iter()
            .map(|name| column(name.as_str()))
            .collect::<Result<Vec<usize>, LoadError>>()?;

        let mut records = Vec::new();
        for (index, row) in rows.enumerate() {
            let row_number = index + 1;
            if row.len() != header.len() {
                return Err(LoadError::RaggedRow {
                    path: path.to_path_buf(),
                    row: row_number,
                    expected: header.len(),
                    found: row.len(),
                });
            }

            let source = row[source_col].clone();
            if source.trim().is_empty() {
                return Err(LoadError::BlankSource {
                    path: path.to_path_buf(),
                    row: row_number,
                });
            }

            let source_lang =
                SourceLang::parse(&row[lang_col]).ok_or_else(|| LoadError::InvalidLanguage {
                    path: path.to_path_buf(),
                    row: row_number,
                    value: row[lang_col].clone(),
                })?;

            let reference = row[candidate_cols[0]].clone();
            let system_texts = candidate_cols[1..]
                .iter()
                .map(|&col| row[col].clone())
                .collect();

            records.push(SourceRecord::new(
                source,
                source_lang,
                reference,
                system_texts,
                row[corpus_col].clone(),
            ));
        }

        debug!(path = %path.display(), rows = records.len(), "parsed dataset rows");

        Ok(Self {
            schema,
            records,
            sha256: None,
        })
    }

    pub fn schema(&self) -> &CandidateSchema {
        &self.schema
    }

    pub fn all_records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&SourceRecord> {
        self.records.get(index)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    pub fn language_counts(&self) -> (usize, usize) {
        let english = self
            .records
            .iter()
            .filter(|record| record.source_lang == SourceLang::En)
            .count();
        (english, self.records.len() - english)
    }
}

/// Path-free variant used in tests that build datasets from literal CSV.
#[cfg(test)]
pub fn parse_for_tests(text: &str, schema: CandidateSchema) -> Result<Dataset, LoadError> {
    Dataset::parse(Path::new("<memory>"), text, schema)
}
