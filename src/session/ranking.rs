use std::collections::BTreeMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::{Outcome, PresentedCandidate, QuestionHeader, SessionState};
use crate::dataset::Dataset;
use crate::error::SessionError;
use crate::model::{JudgmentRow, LanguageFilter, RankLabel, SourceRecord};
use crate::sink::JudgmentSink;
use crate::traversal::{self, Traversal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingQuestion {
    pub header: QuestionHeader,
    /// Non-blank candidates in a freshly shuffled order.
    pub candidates: Vec<PresentedCandidate>,
}

/// Drives the "rank every candidate for this source" workflow.
#[derive(Debug)]
pub struct RankingSession {
    dataset: Arc<Dataset>,
    rng: StdRng,
    traversal: Traversal,
    position: usize,
}

impl RankingSession {
    pub fn new(dataset: Arc<Dataset>, filter: LanguageFilter) -> Self {
        Self::with_rng(dataset, filter, StdRng::from_entropy())
    }

    pub fn with_rng(dataset: Arc<Dataset>, filter: LanguageFilter, mut rng: StdRng) -> Self {
        let traversal = traversal::apply(&dataset, filter, &mut rng);
        info!(
            filter = filter.as_str(),
            questions = traversal.len(),
            "ranking session started"
        );

        Self {
            dataset,
            rng,
            traversal,
            position: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::at(self.position, self.traversal.len())
    }

    pub fn filter(&self) -> LanguageFilter {
        self.traversal.filter()
    }

    /// `(position, total)`; position equals total once complete.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.traversal.len();
        (self.position.min(total), total)
    }

    pub fn traversal(&self) -> &Traversal {
        &self.traversal
    }

    fn current_record(&self) -> Option<&SourceRecord> {
        self.traversal
            .record_index(self.position)
            .and_then(|index| self.dataset.record(index))
    }

    /// The current record with its presentable candidates, reshuffled on
    /// every call. `None` once the session is complete.
    pub fn current_question(&mut self) -> Option<RankingQuestion> {
        let total = self.traversal.len();
        let record = self
            .traversal
            .record_index(self.position)
            .and_then(|index| self.dataset.record(index))?;

        let names = self.dataset.schema().names();
        let mut candidates: Vec<PresentedCandidate> = record
            .presentable_slots()
            .into_iter()
            .map(|slot| PresentedCandidate {
                name: names[slot].clone(),
                text: record.text(slot).unwrap_or_default().to_string(),
            })
            .collect();
        candidates.shuffle(&mut self.rng);

        Some(RankingQuestion {
            header: QuestionHeader::new(record, self.position, total),
            candidates,
        })
    }

    /// Saves the labels (when any is non-empty) and moves to the next
    /// question. Validation and sink failures leave the cursor in place.
    pub fn record_and_advance(
        &mut self,
        labels: &BTreeMap<String, String>,
        sink: &mut dyn JudgmentSink,
    ) -> Result<Outcome, SessionError> {
        if self.state().is_complete() {
            return Ok(Outcome {
                written: false,
                state: SessionState::Complete,
            });
        }

        let written = self.save_labels(labels, sink)?;
        self.position += 1;

        let state = self.state();
        debug!(written, ?state, "ranking question finished");
        Ok(Outcome { written, state })
    }

    /// Flushes any pending non-empty labels, then re-filters and restarts
    /// from the first question of a fresh traversal.
    pub fn set_filter(
        &mut self,
        filter: LanguageFilter,
        pending: &BTreeMap<String, String>,
        sink: &mut dyn JudgmentSink,
    ) -> Result<Outcome, SessionError> {
        let written = if self.state().is_complete() {
            false
        } else {
            self.save_labels(pending, sink)?
        };

        self.traversal = traversal::apply(&self.dataset, filter, &mut self.rng);
        self.position = 0;

        info!(
            filter = filter.as_str(),
            questions = self.traversal.len(),
            flushed_pending = written,
            "ranking filter applied"
        );

        Ok(Outcome {
            written,
            state: self.state(),
        })
    }

    fn save_labels(
        &self,
        labels: &BTreeMap<String, String>,
        sink: &mut dyn JudgmentSink,
    ) -> Result<bool, SessionError> {
        let Some(record) = self.current_record() else {
            return Ok(false);
        };

        let parsed = self.validate_labels(record, labels)?;
        if parsed.iter().all(Option::is_none) {
            return Ok(false);
        }

        sink.append(&JudgmentRow::ranking(record, &parsed))?;
        Ok(true)
    }

    fn validate_labels(
        &self,
        record: &SourceRecord,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Option<RankLabel>>, SessionError> {
        let schema = self.dataset.schema();
        let mut parsed = vec![None; schema.len()];

        for (name, value) in labels {
            let slot = schema
                .position(name)
                .ok_or_else(|| SessionError::UnknownCandidate(name.clone()))?;
            let label =
                RankLabel::parse_cell(value).map_err(|label| SessionError::InvalidLabel {
                    candidate: name.clone(),
                    label,
                })?;

            let blank = record.text(slot).is_none_or(|text| text.trim().is_empty());
            if label.is_some() && blank {
                return Err(SessionError::CandidateNotPresented(name.clone()));
            }

            parsed[slot] = label;
        }

        Ok(parsed)
    }
}
