//! Load balancer strategies for picking among eligible sibling pipelines
//! (§4.8 step 2). Round-robin over the sorted sibling list is the
//! default; the others are available for future strategy-dispatch wiring
//! through configuration.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin,
    Weighted,
    LeastConnections,
    HealthAware,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::RoundRobin
    }
}

/// One counter per router hand-off; the Router already sorts candidates
/// best-score-first, so round-robin here only rotates the starting point
/// rather than re-ranking.
pub struct LoadBalancer {
    strategy: Strategy,
    cursor: AtomicUsize,
}

impl LoadBalancer {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Picks an index into `candidates` (already filtered to healthy,
    /// not-blacklisted pipeline ids, best-score first).
    pub fn pick<'a>(&self, candidates: &'a [String], weights: Option<&[f64]>) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        let index = match self.strategy {
            Strategy::RoundRobin => {
                let i = self.cursor.fetch_add(1, Ordering::Relaxed);
                i % candidates.len()
            }
            Strategy::Weighted => weighted_pick(candidates.len(), weights),
            Strategy::LeastConnections | Strategy::HealthAware => 0,
        };
        candidates.get(index).map(String::as_str)
    }
}

fn weighted_pick(len: usize, weights: Option<&[f64]>) -> usize {
    match weights {
        Some(w) if w.len() == len && !w.is_empty() => {
            w.iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i)
                .unwrap_or(0)
        }
        _ => 0,
    }
}
