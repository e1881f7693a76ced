use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::engine::types::{AttemptRecord, CatalogItem, ScoredItem};

/// Exponential decay rate per hour for history weighting.
const DECAY_LAMBDA_PER_HOUR: f64 = 0.1;
/// Score assigned to items the learner has already attempted. Keeps them at
/// the bottom of the ranking without hard-excluding them.
const ATTEMPTED_FLOOR_SCORE: f64 = 0.1;
/// Success rate assumed for a topic or difficulty bucket with no data.
const DEFAULT_SUCCESS_RATE: f64 = 0.5;

/// Mixing weights for the per-candidate score. Cold-start leans on
/// difficulty fit; warmed-up shifts toward the observed success rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weighting {
    ColdStart,
    WarmedUp,
}

impl Weighting {
    fn factors(&self) -> (f64, f64, f64) {
        match self {
            Weighting::ColdStart => (0.5, 0.3, 0.2),
            Weighting::WarmedUp => (0.3, 0.4, 0.3),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RateBucket {
    weighted_correct: f64,
    weighted_total: f64,
}

impl RateBucket {
    fn add(&mut self, correct: bool, weight: f64) {
        self.weighted_total += weight;
        if correct {
            self.weighted_correct += weight;
        }
    }

    fn rate(&self) -> f64 {
        if self.weighted_total > 0.0 {
            self.weighted_correct / self.weighted_total
        } else {
            DEFAULT_SUCCESS_RATE
        }
    }
}

/// Time-decayed success-rate scorer for cold-start and short-history
/// learners. Pure arithmetic over the provided history and catalog; invoking
/// it concurrently needs no synchronization.
#[derive(Debug, Clone)]
pub struct HeuristicRanker {
    warmup_threshold: usize,
}

impl HeuristicRanker {
    pub fn new(warmup_threshold: usize) -> Self {
        Self { warmup_threshold }
    }

    /// Ranks every catalog item for the learner and returns the top
    /// `top_k` by score descending, ties broken by item id ascending.
    ///
    /// `history` must be ascending by timestamp; the most recent entry
    /// anchors the decay so its weight is exactly 1.0.
    pub fn rank(
        &self,
        history: &[AttemptRecord],
        catalog: &[CatalogItem],
        learner_level: i64,
        top_k: usize,
    ) -> Vec<ScoredItem> {
        let item_meta: HashMap<i64, &CatalogItem> =
            catalog.iter().map(|item| (item.id, item)).collect();

        let weights = time_weights(history);
        let (topic_rates, difficulty_rates) = success_rates(history, &weights, &item_meta);

        let attempted: HashSet<i64> = history.iter().map(|a| a.question_id).collect();
        let weighting = if history.len() < self.warmup_threshold {
            Weighting::ColdStart
        } else {
            Weighting::WarmedUp
        };
        let (w_fit, w_topic, w_difficulty) = weighting.factors();

        let mut scored: Vec<ScoredItem> = catalog
            .iter()
            .map(|item| {
                if attempted.contains(&item.id) {
                    return ScoredItem {
                        question_id: item.id,
                        score: ATTEMPTED_FLOOR_SCORE,
                    };
                }

                let difficulty_fit =
                    (1.0 - (item.difficulty - learner_level).abs() as f64 / 5.0).clamp(0.0, 1.0);
                let topic_score = topic_rates
                    .get(&item.category_id)
                    .map(RateBucket::rate)
                    .unwrap_or(DEFAULT_SUCCESS_RATE);
                let difficulty_score = difficulty_rates
                    .get(&item.difficulty)
                    .map(RateBucket::rate)
                    .unwrap_or(DEFAULT_SUCCESS_RATE);

                ScoredItem {
                    question_id: item.id,
                    score: w_fit * difficulty_fit
                        + w_topic * topic_score
                        + w_difficulty * difficulty_score,
                }
            })
            .collect();

        sort_ranked(&mut scored);
        scored.truncate(top_k);
        scored
    }
}

/// `w = exp(-λ · Δt_hours)` against the most recent entry, one weight per
/// history entry (repeated attempts of one item each keep their own weight).
fn time_weights(history: &[AttemptRecord]) -> Vec<f64> {
    let Some(latest) = history.last() else {
        return Vec::new();
    };

    history
        .iter()
        .map(|entry| {
            let delta_hours =
                (latest.timestamp - entry.timestamp).num_seconds().max(0) as f64 / 3600.0;
            (-DECAY_LAMBDA_PER_HOUR * delta_hours).exp()
        })
        .collect()
}

/// Weighted success accumulators per topic and per difficulty bucket.
/// History entries whose item is missing from the catalog metadata
/// contribute nothing.
fn success_rates(
    history: &[AttemptRecord],
    weights: &[f64],
    item_meta: &HashMap<i64, &CatalogItem>,
) -> (HashMap<i64, RateBucket>, HashMap<i64, RateBucket>) {
    let mut topic_rates: HashMap<i64, RateBucket> = HashMap::new();
    let mut difficulty_rates: HashMap<i64, RateBucket> = HashMap::new();

    for (entry, &weight) in history.iter().zip(weights.iter()) {
        let Some(item) = item_meta.get(&entry.question_id) else {
            continue;
        };
        topic_rates
            .entry(item.category_id)
            .or_default()
            .add(entry.correct, weight);
        difficulty_rates
            .entry(item.difficulty)
            .or_default()
            .add(entry.correct, weight);
    }

    (topic_rates, difficulty_rates)
}

pub(crate) fn sort_ranked(scored: &mut [ScoredItem]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.question_id.cmp(&b.question_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn item(id: i64, category_id: i64, difficulty: i64) -> CatalogItem {
        CatalogItem {
            id,
            category_id,
            difficulty,
        }
    }

    fn attempt(question_id: i64, correct: bool, hours_ago: i64) -> AttemptRecord {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        AttemptRecord {
            question_id,
            correct,
            response_seconds: 2.0,
            timestamp: base - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn empty_history_reduces_to_difficulty_fit() {
        let ranker = HeuristicRanker::new(10);
        let catalog = vec![item(1, 1, 3), item(2, 1, 1), item(3, 2, 5)];

        let ranked = ranker.rank(&[], &catalog, 3, 3);

        // With all success rates at the 0.5 default, the cold-start score is
        // 0.5 * fit + 0.25; a perfect fit wins.
        assert_eq!(ranked[0].question_id, 1);
        assert!((ranked[0].score - (0.5 * 1.0 + 0.3 * 0.5 + 0.2 * 0.5)).abs() < 1e-12);
        assert!((ranked[1].score - (0.5 * 0.6 + 0.25)).abs() < 1e-12);
    }

    #[test]
    fn attempted_items_score_the_floor() {
        let ranker = HeuristicRanker::new(10);
        let catalog = vec![item(1, 1, 3), item(2, 1, 3)];
        let history = vec![attempt(1, true, 1)];

        let ranked = ranker.rank(&history, &catalog, 3, 2);

        assert_eq!(ranked[0].question_id, 2);
        assert_eq!(ranked[1].question_id, 1);
        assert!((ranked[1].score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn attempted_item_never_outranks_unseen_above_floor() {
        let ranker = HeuristicRanker::new(10);
        // Even a poor fit beats the floor:
        // 0.5*0.2 + 0.3*1.0 + 0.2*0.5 = 0.5 > 0.1.
        let catalog = vec![item(1, 1, 3), item(2, 1, 1)];
        let history = vec![attempt(1, true, 1)];

        let ranked = ranker.rank(&history, &catalog, 5, 2);

        assert_eq!(ranked[0].question_id, 2);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn recent_failures_outweigh_old_successes() {
        let ranker = HeuristicRanker::new(1);
        let catalog = vec![
            item(1, 1, 3),
            item(2, 1, 3),
            // Unseen candidates, one per topic, same difficulty fit.
            item(10, 1, 3),
            item(11, 2, 3),
        ];
        // Topic 1: an old success and a fresh failure. The failure carries
        // far more weight, so topic 1's rate drops well below the 0.5
        // default that topic 2 keeps.
        let history = vec![attempt(1, true, 100), attempt(2, false, 0)];

        let ranked = ranker.rank(&history, &catalog, 3, 4);

        let score_of = |id: i64| ranked.iter().find(|s| s.question_id == id).unwrap().score;
        assert!(score_of(11) > score_of(10));
    }

    #[test]
    fn ties_break_by_item_id_ascending() {
        let ranker = HeuristicRanker::new(10);
        let catalog = vec![item(7, 1, 3), item(3, 1, 3), item(5, 1, 3)];

        let ranked = ranker.rank(&[], &catalog, 3, 3);

        let ids: Vec<i64> = ranked.iter().map(|s| s.question_id).collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[test]
    fn top_k_is_bounded_by_catalog_size() {
        let ranker = HeuristicRanker::new(10);
        let catalog = vec![item(1, 1, 3), item(2, 1, 2)];

        assert_eq!(ranker.rank(&[], &catalog, 3, 5).len(), 2);
        assert_eq!(ranker.rank(&[], &catalog, 3, 1).len(), 1);
    }

    #[test]
    fn warmed_up_weighting_kicks_in_at_threshold() {
        let ranker = HeuristicRanker::new(2);
        let catalog = vec![item(1, 1, 3), item(2, 1, 1), item(3, 1, 3)];
        // Two entries reach the warmed-up profile (threshold 2).
        let history = vec![attempt(1, true, 2), attempt(1, true, 1)];

        let ranked = ranker.rank(&history, &catalog, 3, 3);
        let best = &ranked[0];

        // Warmed-up: 0.3*fit + 0.4*topic + 0.3*difficulty. Item 3 shares
        // topic and difficulty with the successful history, fit 1.0.
        assert_eq!(best.question_id, 3);
        assert!((best.score - (0.3 + 0.4 + 0.3)).abs() < 1e-9);
    }
}
