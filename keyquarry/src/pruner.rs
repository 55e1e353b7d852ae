//! Staleness-score eviction policy and prune-run bookkeeping. No direct
//! teacher analogue — the nearest relative is `LogCask::compact`'s
//! periodic, ratio-threshold reclamation (`kv/src/storage/log_cask.rs`) —
//! so the run-history shape follows that compaction-policy idiom even
//! though the selection itself is new.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde_derive::{Deserialize, Serialize};

/// Everything the scoring function needs about one evictable key. Built
/// by the kernel from its entry + metric tables; locked, too-young, and
/// reserved keys are filtered out before candidates ever reach here.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub key: String,
    pub created_at: SystemTime,
    pub last_accessed: SystemTime,
    pub accesses_since_created: u64,
    pub versions_since_created: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct Weights {
    pub age: f64,
    pub idle: f64,
    pub version: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights { age: 1.0, idle: 1.0, version: 1.0 }
    }
}

fn score(candidate: &Candidate, now: SystemTime, weights: &Weights) -> f64 {
    let age = now
        .duration_since(candidate.last_accessed)
        .unwrap_or_default()
        .as_secs_f64();
    let idle_term = 1.0 / (candidate.accesses_since_created.max(1) as f64);
    let version_term = 1.0 / (candidate.versions_since_created.max(1) as f64);
    weights.age * age + weights.idle * idle_term + weights.version * version_term
}

/// Selects up to `count` keys for expunction: the highest-scoring
/// (most stale) candidates, ties broken by earlier `created_at`.
pub fn select_for_eviction(
    candidates: &[Candidate],
    now: SystemTime,
    weights: &Weights,
    count: usize,
) -> Vec<String> {
    let mut scored: Vec<(&Candidate, f64)> =
        candidates.iter().map(|c| (c, score(c, now, weights))).collect();
    scored.sort_by(|(a, sa), (b, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    scored.into_iter().take(count).map(|(c, _)| c.key.clone()).collect()
}

/// A single background or eager prune pass, kept for observability.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PruneRun {
    pub started: SystemTime,
    pub finished: SystemTime,
    pub count_before: u64,
    pub count_after: u64,
    pub selected_keys: Vec<String>,
}

/// Bounded ring of recent prune runs.
pub struct PruneHistory {
    runs: VecDeque<PruneRun>,
    limit: usize,
}

impl PruneHistory {
    pub fn new(limit: usize) -> Self {
        PruneHistory { runs: VecDeque::new(), limit: limit.max(1) }
    }

    pub fn record(&mut self, run: PruneRun) {
        self.runs.push_front(run);
        while self.runs.len() > self.limit {
            self.runs.pop_back();
        }
    }

    pub fn recent(&self) -> Vec<PruneRun> {
        self.runs.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn candidate(key: &str, idle_secs: u64, accesses: u64, versions: u64) -> Candidate {
        let now = SystemTime::now();
        Candidate {
            key: key.to_string(),
            created_at: now - Duration::from_secs(idle_secs + 100),
            last_accessed: now - Duration::from_secs(idle_secs),
            accesses_since_created: accesses,
            versions_since_created: versions,
        }
    }

    #[test]
    fn selects_highest_scoring_first() {
        let now = SystemTime::now();
        let candidates = vec![
            candidate("hot", 1, 50, 50),
            candidate("cold", 10_000, 1, 1),
        ];
        let weights = Weights::default();
        let selected = select_for_eviction(&candidates, now, &weights, 1);
        // "cold" has the largest age term and largest inverse terms, so
        // its total score is the highest and it is the one evicted.
        assert_eq!(selected, vec!["cold".to_string()]);
    }

    #[test]
    fn respects_requested_count() {
        let now = SystemTime::now();
        let candidates = vec![candidate("a", 1, 1, 1), candidate("b", 2, 1, 1), candidate("c", 3, 1, 1)];
        let selected = select_for_eviction(&candidates, now, &Weights::default(), 2);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut history = PruneHistory::new(2);
        for i in 0..5 {
            history.record(PruneRun {
                started: SystemTime::now(),
                finished: SystemTime::now(),
                count_before: i,
                count_after: i,
                selected_keys: vec![],
            });
        }
        assert_eq!(history.recent().len(), 2);
    }
}
