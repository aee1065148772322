//! Score normalization, candidate pooling and top-k selection.
//!
//! Every ranking here orders by score descending and breaks ties by the
//! lower chunk index, so results are reproducible for identical inputs.
use std::cmp::Ordering;
use std::collections::BTreeSet;

use passage_core::types::Mode;

/// Lexical scores spanning less than this are treated as flat.
pub const FLAT_RANGE: f32 = 1e-9;

/// Min-max scale raw lexical scores into `[0, 1]`. A flat score vector maps to zeros.
pub fn normalize_lexical(scores: &[f32]) -> Vec<f32> {
    let (min, max) = scores
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let range = max - min;
    if scores.is_empty() || range.is_nan() || range < FLAT_RANGE {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|&s| (s - min) / range).collect()
}

/// Map cosine similarity from `[-1, 1]` onto `[0, 1]`.
pub fn normalize_semantic(scores: &[f32]) -> Vec<f32> {
    scores.iter().map(|&s| ((s + 1.0) / 2.0).clamp(0.0, 1.0)).collect()
}

fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Best `k` of `(index, score)` pairs, fully ordered.
pub fn top_k_pairs(mut pairs: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    let k = k.min(pairs.len());
    if k == 0 {
        return Vec::new();
    }
    if k < pairs.len() {
        pairs.select_nth_unstable_by(k - 1, rank);
        pairs.truncate(k);
    }
    pairs.sort_unstable_by(rank);
    pairs
}

/// Indices of the best `k` scores, best first.
pub fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let pairs = scores.iter().copied().enumerate().collect();
    top_k_pairs(pairs, k).into_iter().map(|(i, _)| i).collect()
}

/// Union of each signal's top `m` indices, ascending.
pub fn candidate_set(semantic: &[f32], lexical: &[f32], m: usize) -> BTreeSet<usize> {
    top_k_indices(semantic, m)
        .into_iter()
        .chain(top_k_indices(lexical, m))
        .collect()
}

/// Normalized per-chunk scores; a signal is present only when the mode uses it.
#[derive(Debug, Default, Clone)]
pub struct Signals {
    pub semantic: Option<Vec<f32>>,
    pub lexical: Option<Vec<f32>>,
}

/// Pick the final `(index, score)` list for `mode` from normalized signals.
/// A signal the mode needs but which is missing selects nothing.
pub fn select(mode: Mode, top_k: usize, signals: &Signals) -> Vec<(usize, f32)> {
    let indexed = |scores: &[f32]| scores.iter().copied().enumerate().collect::<Vec<_>>();
    match (mode, signals.semantic.as_deref(), signals.lexical.as_deref()) {
        (Mode::Semantic, Some(sem), _) => top_k_pairs(indexed(sem), top_k),
        (Mode::Lexical, _, Some(lex)) => top_k_pairs(indexed(lex), top_k),
        (Mode::Hybrid { alpha, candidate_multiplier }, Some(sem), Some(lex)) => {
            let n = sem.len().min(lex.len());
            let m = top_k.saturating_mul(candidate_multiplier).min(n);
            let fused = candidate_set(&sem[..n], &lex[..n], m)
                .into_iter()
                .map(|i| (i, alpha * sem[i] + (1.0 - alpha) * lex[i]))
                .collect();
            top_k_pairs(fused, top_k)
        }
        _ => Vec::new(),
    }
}
