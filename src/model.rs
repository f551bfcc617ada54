use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLang {
    En,
    Fr,
}

impl SourceLang {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "fr" => Some(Self::Fr),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageFilter {
    #[default]
    Both,
    English,
    French,
}

impl LanguageFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::English => "english",
            Self::French => "french",
        }
    }

    pub fn matches(self, lang: SourceLang) -> bool {
        match self {
            Self::Both => true,
            Self::English => lang == SourceLang::En,
            Self::French => lang == SourceLang::Fr,
        }
    }
}

impl FromStr for LanguageFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "both" | "all" => Ok(Self::Both),
            "english" | "en" => Ok(Self::English),
            "french" | "fr" => Ok(Self::French),
            other => Err(format!("unknown language filter `{other}`")),
        }
    }
}

/// One row of the dataset. Candidate texts are aligned with the schema the
/// record was loaded with; slot 0 is the bureau reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub source: String,
    pub source_lang: SourceLang,
    pub corpus_type: String,
    texts: Vec<String>,
}

impl SourceRecord {
    pub fn new(
        source: impl Into<String>,
        source_lang: SourceLang,
        reference: impl Into<String>,
        system_texts: Vec<String>,
        corpus_type: impl Into<String>,
    ) -> Self {
        let mut texts = Vec::with_capacity(system_texts.len() + 1);
        texts.push(reference.into());
        texts.extend(system_texts);

        Self {
            source: source.into(),
            source_lang,
            corpus_type: corpus_type.into(),
            texts,
        }
    }

    pub fn reference(&self) -> &str {
        &self.texts[0]
    }

    pub fn text(&self, slot: usize) -> Option<&str> {
        self.texts.get(slot).map(String::as_str)
    }

    pub fn slot_count(&self) -> usize {
        self.texts.len()
    }

    /// Schema slots whose text is non-blank, in schema order.
    pub fn presentable_slots(&self) -> Vec<usize> {
        self.texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(slot, _)| slot)
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankLabel {
    Good,
    Bad,
    Best,
    Unknown,
}

impl RankLabel {
    pub const ALL: [RankLabel; 4] = [Self::Good, Self::Bad, Self::Best, Self::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
            Self::Best => "best",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a label cell; the empty string means "not ranked".
    pub fn parse_cell(value: &str) -> Result<Option<Self>, String> {
        match value.trim() {
            "" => Ok(None),
            "good" => Ok(Some(Self::Good)),
            "bad" => Ok(Some(Self::Bad)),
            "best" => Ok(Some(Self::Best)),
            "unknown" => Ok(Some(Self::Unknown)),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonLabel {
    Better,
    Worse,
}

impl ComparisonLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Better => "better",
            Self::Worse => "worse",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Choice {
    First,
    Second,
}

impl FromStr for Choice {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "first" | "a" => Ok(Self::First),
            "2" | "second" | "b" => Ok(Self::Second),
            other => Err(SessionError::InvalidChoice(other.to_string())),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgmentKind {
    Ranking,
    Comparison,
}

impl fmt::Display for JudgmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ranking => f.write_str("ranking"),
            Self::Comparison => f.write_str("comparison"),
        }
    }
}

/// A completed judgment ready for the result sink. `labels` holds one cell
/// per schema candidate, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentRow {
    pub kind: JudgmentKind,
    pub source: String,
    pub corpus_type: String,
    pub labels: Vec<String>,
}

impl JudgmentRow {
    pub fn ranking(record: &SourceRecord, labels: &[Option<RankLabel>]) -> Self {
        Self {
            kind: JudgmentKind::Ranking,
            source: record.source.clone(),
            corpus_type: record.corpus_type.clone(),
            labels: labels
                .iter()
                .map(|label| label.map(RankLabel::as_str).unwrap_or("").to_string())
                .collect(),
        }
    }

    pub fn comparison(record: &SourceRecord, better: usize, worse: usize) -> Self {
        let mut labels = vec![String::new(); record.slot_count()];
        labels[better] = ComparisonLabel::Better.as_str().to_string();
        labels[worse] = ComparisonLabel::Worse.as_str().to_string();

        Self {
            kind: JudgmentKind::Comparison,
            source: record.source.clone(),
            corpus_type: record.corpus_type.clone(),
            labels,
        }
    }

    /// Full output row: `source`, candidate labels, `corpus_type`.
    pub fn cells(&self) -> Vec<&str> {
        let mut cells = Vec::with_capacity(self.labels.len() + 2);
        cells.push(self.source.as_str());
        cells.extend(self.labels.iter().map(String::as_str));
        cells.push(self.corpus_type.as_str());
        cells
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeInput {
    pub filename: String,
    pub corpus_type: String,
    pub sha256: String,
    pub source_groups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub input_directory: String,
    pub output_path: String,
    pub inputs: Vec<MergeInput>,
    pub translator_columns: Vec<String>,
    pub row_count: usize,
    pub corpus_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CandidateTally {
    pub good: usize,
    pub bad: usize,
    pub best: usize,
    pub unknown: usize,
    pub better: usize,
    pub worse: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatus {
    pub path: String,
    pub sha256: String,
    pub record_count: usize,
    pub english_count: usize,
    pub french_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsStatus {
    pub path: String,
    pub data_rows: usize,
    pub ranking_rows: usize,
    pub comparison_rows: usize,
    pub unrecognized_cells: usize,
    pub candidates: BTreeMap<String, CandidateTally>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: String,
    pub dataset: Option<DatasetStatus>,
    pub results: Option<ResultsStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SourceRecord {
        SourceRecord::new(
            "Hi there",
            SourceLang::En,
            "Salut",
            vec!["Bonjour".to_string(), "  ".to_string()],
            "news",
        )
    }

    #[test]
    fn presentable_slots_skip_blank_text() {
        assert_eq!(record().presentable_slots(), vec![0, 1]);
    }

    #[test]
    fn rank_label_parse_cell_accepts_vocabulary_and_blank() {
        assert_eq!(RankLabel::parse_cell(""), Ok(None));
        assert_eq!(RankLabel::parse_cell(" best "), Ok(Some(RankLabel::Best)));
        assert_eq!(RankLabel::parse_cell("great"), Err("great".to_string()));
    }

    #[test]
    fn choice_parses_aliases_and_rejects_other_values() {
        assert_eq!("1".parse::<Choice>().ok(), Some(Choice::First));
        assert_eq!("Second".parse::<Choice>().ok(), Some(Choice::Second));
        assert!(matches!(
            "3".parse::<Choice>(),
            Err(SessionError::InvalidChoice(value)) if value == "3"
        ));
    }

    #[test]
    fn comparison_row_marks_only_the_sampled_pair() {
        let row = JudgmentRow::comparison(&record(), 1, 0);
        assert_eq!(row.kind, JudgmentKind::Comparison);
        assert_eq!(row.cells(), vec!["Hi there", "worse", "better", "", "news"]);
    }

    #[test]
    fn language_filter_parses_short_forms() {
        assert_eq!("fr".parse::<LanguageFilter>(), Ok(LanguageFilter::French));
        assert!(LanguageFilter::English.matches(SourceLang::En));
        assert!(!LanguageFilter::English.matches(SourceLang::Fr));
        assert!(LanguageFilter::Both.matches(SourceLang::Fr));
    }
}
