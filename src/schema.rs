use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Candidate name under which the bureau reference translation is presented.
pub const REFERENCE_CANDIDATE: &str = "translation_bureau";

pub const DEFAULT_MT_SYSTEMS: &[&str] = &[
    "m2m100_418m_base",
    "m2m100_418m_finetuned",
    "mbart50_mmt_base",
    "mbart50_mmt_finetuned",
    "nllb_3b_base_researchonly",
    "opus_mt_base",
    "opus_mt_finetuned",
];

/// On-disk form of a schema override passed with `--schema-path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSchemaFile {
    pub systems: Vec<String>,
}

/// The closed, ordered set of candidate names known to the engine.
///
/// The reference candidate is always first. Judgment rows carry one cell per
/// name in this order, between `source` and `corpus_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSchema {
    names: Vec<String>,
}

impl Default for CandidateSchema {
    fn default() -> Self {
        let mut names = vec![REFERENCE_CANDIDATE.to_string()];
        names.extend(DEFAULT_MT_SYSTEMS.iter().map(|name| name.to_string()));
        Self { names }
    }
}

impl CandidateSchema {
    pub fn with_systems<I, S>(systems: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = vec![REFERENCE_CANDIDATE.to_string()];
        let mut seen: HashSet<String> = names.iter().cloned().collect();

        for system in systems {
            let system = system.into().trim().to_string();
            if system.is_empty() {
                return Err(LoadError::Schema("blank MT system name".to_string()));
            }
            if matches!(system.as_str(), "source" | "source_lang" | "corpus_type") {
                return Err(LoadError::Schema(format!(
                    "`{system}` is a reserved column name"
                )));
            }
            if !seen.insert(system.clone()) {
                return Err(LoadError::Schema(format!(
                    "duplicate candidate name `{system}`"
                )));
            }
            names.push(system);
        }

        Ok(Self { names })
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let raw = fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CandidateSchemaFile = serde_json::from_slice(&raw).map_err(|err| {
            LoadError::Schema(format!("failed to parse {}: {err}", path.display()))
        })?;
        Self::with_systems(file.systems)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    /// Header of the judgment log: `source`, every candidate, `corpus_type`.
    pub fn output_header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.names.len() + 2);
        header.push("source".to_string());
        header.extend(self.names.iter().cloned());
        header.push("corpus_type".to_string());
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_starts_with_reference_and_keeps_listed_order() {
        let schema = CandidateSchema::default();
        assert_eq!(schema.len(), 8);
        assert_eq!(schema.names()[0], REFERENCE_CANDIDATE);
        assert_eq!(schema.names()[7], "opus_mt_finetuned");
        assert_eq!(schema.position("mbart50_mmt_base"), Some(3));
    }

    #[test]
    fn output_header_wraps_candidates_with_source_and_corpus_type() {
        let schema = CandidateSchema::with_systems(["sysA", "sysB"]).expect("valid schema");
        assert_eq!(
            schema.output_header(),
            vec!["source", "translation_bureau", "sysA", "sysB", "corpus_type"]
        );
    }

    #[test]
    fn with_systems_rejects_duplicates_and_reserved_names() {
        assert!(CandidateSchema::with_systems(["sysA", "sysA"]).is_err());
        assert!(CandidateSchema::with_systems([REFERENCE_CANDIDATE]).is_err());
        assert!(CandidateSchema::with_systems(["corpus_type"]).is_err());
        assert!(CandidateSchema::with_systems(["  "]).is_err());
    }

    #[test]
    fn load_reads_system_list_from_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("schema.json");
        fs::write(&path, r#"{ "systems": ["opus_mt_base", "nllb_3b"] }"#).expect("write schema");

        let schema = CandidateSchema::load(&path).expect("schema should load");
        assert_eq!(
            schema.names(),
            &["translation_bureau", "opus_mt_base", "nllb_3b"]
        );
    }
}
