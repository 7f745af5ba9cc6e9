//! PageRank Engine (spec.md §4.7).
//!
//! Canonical power iteration over the symbol graph's adjacency:
//! `r ← d · Mᵀ r + (1 − d) · v`, with dangling nodes redistributing their
//! mass uniformly across all nodes. Supports a personalized `v` for topical
//! ranking; defaults to uniform.

use std::collections::HashMap;

/// Damping factor and convergence knobs; defaults match spec.md §4.7.
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub convergence_threshold: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            convergence_threshold: 1e-6,
        }
    }
}

/// Computes PageRank scores over an adjacency map (unit id -> outgoing targets).
///
/// `personalization` optionally supplies a non-uniform restart vector `v`;
/// entries are normalized to sum to one, and ids absent from it fall back to
/// zero mass (not uniform), matching the standard personalized-PageRank
/// definition.
pub fn compute(
    adjacency: &HashMap<String, Vec<String>>,
    config: &PageRankConfig,
    personalization: Option<&HashMap<String, f64>>,
) -> HashMap<String, f64> {
    let n = adjacency.len();
    if n == 0 {
        return HashMap::new();
    }

    let ids: Vec<&String> = adjacency.keys().collect();
    let index_of: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let out_degree: Vec<usize> = ids.iter().map(|id| adjacency[id.as_str()].len()).collect();

    let v = restart_vector(&ids, personalization, n);

    let mut scores = v.clone();

    for _ in 0..config.max_iterations {
        let mut next = vec![0.0_f64; n];
        let mut dangling_mass = 0.0_f64;

        for (i, id) in ids.iter().enumerate() {
            if out_degree[i] == 0 {
                dangling_mass += scores[i];
                continue;
            }
            let share = scores[i] / out_degree[i] as f64;
            for target in &adjacency[id.as_str()] {
                if let Some(&j) = index_of.get(target.as_str()) {
                    next[j] += share;
                }
            }
        }

        for i in 0..n {
            next[i] = config.damping * (next[i] + dangling_mass * v[i]) + (1.0 - config.damping) * v[i];
        }

        let delta: f64 = next
            .iter()
            .zip(scores.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();

        scores = next;

        if delta < config.convergence_threshold {
            break;
        }
    }

    normalize(&mut scores);

    ids.into_iter()
        .zip(scores)
        .map(|(id, score)| (id.clone(), score))
        .collect()
}

fn restart_vector(
    ids: &[&String],
    personalization: Option<&HashMap<String, f64>>,
    n: usize,
) -> Vec<f64> {
    match personalization {
        Some(p) if !p.is_empty() => {
            let total: f64 = p.values().sum();
            ids.iter()
                .map(|id| p.get(id.as_str()).copied().unwrap_or(0.0) / total)
                .collect()
        }
        _ => vec![1.0 / n as f64; n],
    }
}

fn normalize(scores: &mut [f64]) {
    let sum: f64 = scores.iter().sum();
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}
