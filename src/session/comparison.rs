use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::{Outcome, PresentedCandidate, QuestionHeader, SessionState};
use crate::dataset::Dataset;
use crate::error::SessionError;
use crate::model::{Choice, JudgmentRow, LanguageFilter, SourceRecord};
use crate::sink::JudgmentSink;
use crate::traversal::{self, Traversal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonQuestion {
    pub header: QuestionHeader,
    pub first: PresentedCandidate,
    pub second: PresentedCandidate,
}

/// Drives the pairwise "which is better" workflow.
#[derive(Debug)]
pub struct ComparisonSession {
    dataset: Arc<Dataset>,
    rng: StdRng,
    traversal: Traversal,
    position: usize,
    // Schema slots of the pair most recently shown at `position`.
    presented: Option<(usize, usize)>,
}

impl ComparisonSession {
    pub fn new(dataset: Arc<Dataset>, filter: LanguageFilter) -> Self {
        Self::with_rng(dataset, filter, StdRng::from_entropy())
    }

    pub fn with_rng(dataset: Arc<Dataset>, filter: LanguageFilter, mut rng: StdRng) -> Self {
        let traversal = traversal::apply(&dataset, filter, &mut rng);
        info!(
            filter = filter.as_str(),
            questions = traversal.len(),
            "comparison session started"
        );

        Self {
            dataset,
            rng,
            traversal,
            position: 0,
            presented: None,
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

    /// Samples a fresh pair of distinct non-blank candidates for the current
    /// record. Records with fewer than two candidates are reported as
    /// `InsufficientCandidates` and the cursor stays where it is.
    pub fn current_question(&mut self) -> Result<Option<ComparisonQuestion>, SessionError> {
        self.presented = None;

        let total = self.traversal.len();
        let Some(record) = self
            .traversal
            .record_index(self.position)
            .and_then(|index| self.dataset.record(index))
        else {
            return Ok(None);
        };

        let mut slots = record.presentable_slots();
        if slots.len() < 2 {
            warn!(
                position = self.position,
                available = slots.len(),
                source = %record.source,
                "not enough translations for a comparison"
            );
            return Err(SessionError::InsufficientCandidates {
                available: slots.len(),
            });
        }

        let (picked, _) = slots.partial_shuffle(&mut self.rng, 2);
        let (first, second) = (picked[0], picked[1]);

        let names = self.dataset.schema().names();
        let present = |slot: usize| PresentedCandidate {
            name: names[slot].clone(),
            text: record.text(slot).unwrap_or_default().to_string(),
        };
        let question = ComparisonQuestion {
            header: QuestionHeader::new(record, self.position, total),
            first: present(first),
            second: present(second),
        };

        self.presented = Some((first, second));
        Ok(Some(question))
    }

    /// Records the chosen candidate as `better`, the other as `worse`, and
    /// moves on. A sink failure leaves the pair and the cursor untouched.
    pub fn choose_better(
        &mut self,
        which: Choice,
        sink: &mut dyn JudgmentSink,
    ) -> Result<Outcome, SessionError> {
        if self.state().is_complete() {
            return Ok(Outcome {
                written: false,
                state: SessionState::Complete,
            });
        }

        let (first, second) = self.presented.ok_or(SessionError::NoPairPresented)?;
        let (better, worse) = match which {
            Choice::First => (first, second),
            Choice::Second => (second, first),
        };

        let record = self
            .current_record()
            .ok_or(SessionError::NoPairPresented)?;
        sink.append(&JudgmentRow::comparison(record, better, worse))?;

        self.advance();
        let state = self.state();
        debug!(?which, ?state, "comparison recorded");
        Ok(Outcome {
            written: true,
            state,
        })
    }

    /// Moves past the current question without recording anything.
    pub fn skip(&mut self) -> SessionState {
        if !self.state().is_complete() {
            debug!(position = self.position, "comparison skipped");
            self.advance();
        }
        self.state()
    }

    pub fn set_filter(&mut self, filter: LanguageFilter) -> SessionState {
        self.traversal = traversal::apply(&self.dataset, filter, &mut self.rng);
        self.position = 0;
        self.presented = None;

        info!(
            filter = filter.as_str(),
            questions = self.traversal.len(),
            "comparison filter applied"
        );
        self.state()
    }

    fn advance(&mut self) {
        self.position += 1;
        self.presented = None;
    }
}
