use crate::models::Item;
use crate::utils::cosine_similarity;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const SIMILARITY_WEIGHT: f32 = 0.5;
pub const RECENCY_WEIGHT: f32 = 0.3;
pub const POPULARITY_WEIGHT: f32 = 0.2;
pub const RECENCY_DECAY_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub similarity: f32,
    pub recency: f32,
    pub popularity: f32,
    pub combined: f32,
}

impl ScoreBreakdown {
    pub fn describe(&self) -> String {
        format!(
            "similarity {:.3}, recency {:.3}, popularity {:.3}",
            self.similarity, self.recency, self.popularity
        )
    }
}

/// An item paired with its embedding, ready to be scored.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub item: Item,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: Item,
    pub breakdown: ScoreBreakdown,
}

/// `exp(-hours / 24)` since the last click, or 0 if never clicked.
pub fn recency_score(last_clicked: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    match last_clicked {
        None => 0.0,
        Some(at) => {
            let elapsed_ms = now.signed_duration_since(at).num_milliseconds().max(0);
            let hours = elapsed_ms as f64 / 3_600_000.0;
            (-hours / RECENCY_DECAY_HOURS).exp() as f32
        }
    }
}

pub fn popularity_score(clicks: u64, max_clicks_in_set: u64) -> f32 {
    if max_clicks_in_set == 0 {
        return 0.0;
    }
    let score = (clicks as f64).ln_1p() / (max_clicks_in_set as f64).ln_1p();
    score.clamp(0.0, 1.0) as f32
}

pub fn combine(similarity: f32, recency: f32, popularity: f32) -> f32 {
    let combined = SIMILARITY_WEIGHT * similarity
        + RECENCY_WEIGHT * recency
        + POPULARITY_WEIGHT * popularity;
    if combined.is_nan() {
        0.0
    } else {
        combined.clamp(0.0, 1.0)
    }
}

/// Descending score, ascending id on ties.
pub fn rank_order(a_score: f32, a_id: &str, b_score: f32, b_id: &str) -> Ordering {
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_id.cmp(b_id))
}

/// Blends embedding similarity, click recency and click popularity with fixed weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        item: &Item,
        item_embedding: &[f32],
        target_embedding: &[f32],
        max_clicks_in_set: u64,
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        let similarity = cosine_similarity(item_embedding, target_embedding);
        let recency = recency_score(item.last_clicked, now);
        let popularity = popularity_score(item.clicks, max_clicks_in_set);

        ScoreBreakdown {
            similarity,
            recency,
            popularity,
            combined: combine(similarity, recency, popularity),
        }
    }

    /// Scores every candidate against `target_embedding` and returns the top `limit`.
    pub fn rank(
        &self,
        candidates: &[Candidate],
        target_embedding: &[f32],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<ScoredItem> {
        let max_clicks_in_set = candidates.iter().map(|c| c.item.clicks).max().unwrap_or(0);

        let mut scored: Vec<ScoredItem> = candidates
            .par_iter()
            .map(|candidate| ScoredItem {
                item: candidate.item.clone(),
                breakdown: self.score(
                    &candidate.item,
                    &candidate.embedding,
                    target_embedding,
                    max_clicks_in_set,
                    now,
                ),
            })
            .collect();

        scored.sort_by(|a, b| {
            rank_order(a.breakdown.combined, &a.item.id, b.breakdown.combined, &b.item.id)
        });
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_recency_is_one_at_click_and_zero_when_absent() {
        let now = Utc::now();
        assert_eq!(recency_score(None, now), 0.0);
        assert!((recency_score(Some(now), now) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_recency_strictly_decreases() {
        let now = Utc::now();
        let mut previous = recency_score(Some(now), now);
        for hours in [1, 6, 24, 72, 240] {
            let current = recency_score(Some(now - Duration::hours(hours)), now);
            assert!(current < previous, "recency did not decrease at {} hours", hours);
            assert!(current > 0.0);
            previous = current;
        }
    }

    #[test]
    fn test_recency_one_day_matches_decay_constant() {
        let now = Utc::now();
        let day_old = recency_score(Some(now - Duration::hours(24)), now);
        assert!((day_old - (-1.0f32).exp()).abs() < 1e-5);
    }

    #[test]
    fn test_future_click_does_not_exceed_one() {
        let now = Utc::now();
        assert!(recency_score(Some(now + Duration::hours(2)), now) <= 1.0);
    }

    #[test]
    fn test_popularity_bounds() {
        assert_eq!(popularity_score(0, 0), 0.0);
        assert_eq!(popularity_score(5, 0), 0.0);
        assert!((popularity_score(10, 10) - 1.0).abs() < 1e-6);
        assert_eq!(popularity_score(0, 10), 0.0);
        let mid = popularity_score(3, 10);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_combine_is_monotonic_and_bounded() {
        let steps = [-1.0f32, -0.5, 0.0, 0.25, 0.5, 0.75, 1.0];
        for &fixed_a in &[0.0f32, 0.5, 1.0] {
            for &fixed_b in &[0.0f32, 0.5, 1.0] {
                let mut prev_sim = f32::MIN;
                let mut prev_rec = f32::MIN;
                let mut prev_pop = f32::MIN;
                for &x in &steps {
                    let by_sim = combine(x, fixed_a, fixed_b);
                    let by_rec = combine(fixed_a, x.max(0.0), fixed_b);
                    let by_pop = combine(fixed_a, fixed_b, x.max(0.0));
                    for v in [by_sim, by_rec, by_pop] {
                        assert!((0.0..=1.0).contains(&v));
                    }
                    assert!(by_sim >= prev_sim);
                    assert!(by_rec >= prev_rec);
                    assert!(by_pop >= prev_pop);
                    prev_sim = by_sim;
                    prev_rec = by_rec;
                    prev_pop = by_pop;
                }
            }
        }
    }

    #[test]
    fn test_combine_maps_nan_to_zero() {
        assert_eq!(combine(f32::NAN, 0.5, 0.5), 0.0);
    }

    #[test]
    fn test_popular_similar_item_outranks_cold_item() {
        let now = Utc::now();
        let target = vec![1.0, 0.0];
        // cos = 0.9 and cos = 0.1 against the target
        let a_embedding = vec![0.9, (1.0f32 - 0.81).sqrt()];
        let b_embedding = vec![0.1, (1.0f32 - 0.01).sqrt()];

        let candidates = vec![
            Candidate { item: Item::new("b", "B", "cat"), embedding: b_embedding },
            Candidate { item: Item::new("a", "A", "cat").with_clicks(10), embedding: a_embedding },
        ];

        let ranked = Scorer::new().rank(&candidates, &target, 1, now);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item.id, "a");
        assert!((ranked[0].breakdown.similarity - 0.9).abs() < 1e-5);
        assert!((ranked[0].breakdown.popularity - 1.0).abs() < 1e-6);

        let all = Scorer::new().rank(&candidates, &target, 10, now);
        assert!(all[0].breakdown.combined > all[1].breakdown.combined);
    }

    #[test]
    fn test_ties_break_by_item_id() {
        let now = Utc::now();
        let target = vec![1.0, 0.0];
        let candidates: Vec<Candidate> = ["c", "a", "b"]
            .iter()
            .map(|id| Candidate { item: Item::new(*id, *id, "cat"), embedding: vec![1.0, 0.0] })
            .collect();

        let ranked = Scorer::new().rank(&candidates, &target, 10, now);
        let ids: Vec<&str> = ranked.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_all_zero_clicks_never_nan() {
        let now = Utc::now();
        let candidates = vec![
            Candidate { item: Item::new("x", "X", "cat"), embedding: vec![0.0, 0.0] },
            Candidate { item: Item::new("y", "Y", "cat"), embedding: vec![0.0, 1.0] },
        ];
        let ranked = Scorer::new().rank(&candidates, &[0.0, 0.0], 10, now);
        for scored in ranked {
            assert_eq!(scored.breakdown.combined, 0.0);
        }
    }
}
