use std::collections::HashSet;

use chatmark_types::{Annotation, AnnotationId};
use tracing::debug;

/// Result of merging an incoming batch into a base sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Base annotations followed by the newly appended ones.
    pub merged: Vec<Annotation>,
    /// Incoming annotations appended to the base.
    pub added: usize,
    /// Incoming annotations dropped because their id was already present.
    pub discarded: usize,
}

impl MergeOutcome {
    /// Returns `true` if the merge appended anything.
    pub fn changed(&self) -> bool {
        self.added > 0
    }
}

/// Merge `incoming` into `base` by id.
///
/// An incoming annotation whose id already appears in `base`, or earlier in
/// `incoming`, is discarded without comparing contents. Everything else is
/// appended after the base in incoming order. Merging the same batch twice
/// adds nothing the second time.
pub fn merge<I>(base: Vec<Annotation>, incoming: I) -> MergeOutcome
where
    I: IntoIterator<Item = Annotation>,
{
    let mut seen: HashSet<AnnotationId> = base.iter().map(|a| a.id.clone()).collect();
    let mut merged = base;
    let base_len = merged.len();
    let mut discarded = 0usize;

    for annotation in incoming {
        if seen.insert(annotation.id.clone()) {
            merged.push(annotation);
        } else {
            discarded += 1;
        }
    }

    let added = merged.len() - base_len;
    debug!(base = base_len, added, discarded, "merged annotations");
    MergeOutcome {
        merged,
        added,
        discarded,
    }
}

/// Fold several batches into `base`, one after another.
pub fn merge_all<B, I>(base: Vec<Annotation>, batches: B) -> MergeOutcome
where
    B: IntoIterator<Item = I>,
    I: IntoIterator<Item = Annotation>,
{
    batches.into_iter().fold(
        MergeOutcome {
            merged: base,
            ..MergeOutcome::default()
        },
        |acc, batch| {
            let step = merge(acc.merged, batch);
            MergeOutcome {
                merged: step.merged,
                added: acc.added + step.added,
                discarded: acc.discarded + step.discarded,
            }
        },
    )
}
