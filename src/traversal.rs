use rand::Rng;
use rand::seq::SliceRandom;

use crate::dataset::Dataset;
use crate::model::LanguageFilter;

/// Records selected by one filter activation, plus the order to visit them in.
///
/// `view` holds dataset indices in dataset order; `order` is a permutation of
/// `0..view.len()`.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    filter: LanguageFilter,
    view: Vec<usize>,
    order: Vec<usize>,
}

impl Traversal {
    pub fn filter(&self) -> LanguageFilter {
        self.filter
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Dataset indices matching the filter, in dataset order.
    pub fn view(&self) -> &[usize] {
        &self.view
    }

    /// Indices into `view`, in visiting order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Dataset index of the record visited at `position`.
    pub fn record_index(&self, position: usize) -> Option<usize> {
        self.order
            .get(position)
            .and_then(|&view_index| self.view.get(view_index).copied())
    }
}

/// Filters the dataset and draws a fresh visiting order.
pub fn apply<R: Rng + ?Sized>(
    dataset: &Dataset,
    filter: LanguageFilter,
    rng: &mut R,
) -> Traversal {
    let view: Vec<usize> = dataset
        .all_records()
        .iter()
        .enumerate()
        .filter(|(_, record)| filter.matches(record.source_lang))
        .map(|(index, _)| index)
        .collect();

    let mut order: Vec<usize> = (0..view.len()).collect();
    order.shuffle(rng);

    Traversal {
        filter,
        view,
        order,
    }
}
