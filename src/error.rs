//! Typed errors for the annotation engine.
//!
//! - `LoadError`: the input table could not be turned into a dataset
//! - `SessionError`: a session operation was rejected
//! - `SinkError`: a judgment could not be persisted

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the dataset or the candidate schema.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is empty; expected a header row")]
    Empty { path: PathBuf },

    #[error("malformed CSV in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("{path} is missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path} row {row}: expected {expected} cells, found {found}")]
    RaggedRow {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{path} row {row}: unsupported source_lang `{value}` (expected en or fr)")]
    InvalidLanguage {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("{path} row {row}: `source` is blank")]
    BlankSource { path: PathBuf, row: usize },

    #[error("invalid candidate schema: {0}")]
    Schema(String),
}

/// Errors from the ranking and comparison state machines.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("record has {available} presentable candidate(s); a comparison needs at least 2")]
    InsufficientCandidates { available: usize },

    #[error("invalid rank label `{label}` for {candidate} (expected good, bad, best, unknown or empty)")]
    InvalidLabel { candidate: String, label: String },

    #[error("unknown candidate `{0}`")]
    UnknownCandidate(String),

    #[error("candidate `{0}` has no text for the current record")]
    CandidateNotPresented(String),

    #[error("invalid choice `{0}` (expected 1, 2, first or second)")]
    InvalidChoice(String),

    #[error("no comparison pair has been presented at the current position")]
    NoPairPresented,

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Errors from the append-only result sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write results to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("existing results header in {path} does not match the candidate schema (found `{found}`)")]
    HeaderMismatch { path: PathBuf, found: String },

    #[error("row has {found} label cells but the schema has {expected} candidates")]
    Width { expected: usize, found: usize },
}
