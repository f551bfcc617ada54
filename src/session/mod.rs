//! Annotation session state machines.
//!
//! Both sessions walk their own randomized traversal of the dataset and write
//! completed judgments to a caller-supplied [`JudgmentSink`]. Position only
//! moves forward; past the last question a session is `Complete`.
//!
//! [`JudgmentSink`]: crate::sink::JudgmentSink

use serde::Serialize;

use crate::model::{SourceLang, SourceRecord};

mod comparison;
mod ranking;

pub use comparison::{ComparisonQuestion, ComparisonSession};
pub use ranking::{RankingQuestion, RankingSession};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionState {
    Active { position: usize },
    Complete,
}

impl SessionState {
    fn at(position: usize, total: usize) -> Self {
        if position < total {
            Self::Active { position }
        } else {
            Self::Complete
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Result of an operation that may write a judgment and move the cursor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Outcome {
    pub written: bool,
    pub state: SessionState,
}

/// A candidate as shown to the annotator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedCandidate {
    pub name: String,
    pub text: String,
}

/// Fields of the record behind the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionHeader {
    /// Zero-based position in the traversal.
    pub position: usize,
    pub total: usize,
    pub source: String,
    pub source_lang: SourceLang,
    pub corpus_type: String,
}

impl QuestionHeader {
    fn new(record: &SourceRecord, position: usize, total: usize) -> Self {
        Self {
            position,
            total,
            source: record.source.clone(),
            source_lang: record.source_lang,
            corpus_type: record.corpus_type.clone(),
        }
    }
}
