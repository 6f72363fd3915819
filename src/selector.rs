//! Decide which candidates are new.

use crate::models::CandidateItem;
use crate::watermark::Watermark;
use itertools::Itertools;

/// Return the candidates whose id is absent from `watermark`, in delivery
/// order.
///
/// `candidates` must be oldest-first (the scanner contract); the result keeps
/// that order so several new items are reported chronologically. Duplicate
/// ids within one scan keep their first occurrence. Pure and deterministic.
pub fn select_new(candidates: &[CandidateItem], watermark: &Watermark) -> Vec<CandidateItem> {
    candidates
        .iter()
        .unique_by(|item| item.id.clone())
        .filter(|item| !watermark.contains(&item.id))
        .cloned()
        .collect()
}
