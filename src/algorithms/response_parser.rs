//! Turns free-form generator output into scored recommendations.
//!
//! A candidate's title appearing in the text opens an attribution block for
//! that candidate; everything up to the next recognized title is its
//! reasoning. Each block is scored by counting confidence markers in the
//! reasoning, starting from a neutral 0.5.

use crate::error::{RecommenderError, Result};
use crate::models::{Item, Recommendation};
use std::collections::HashMap;
use tracing::debug;

pub const POSITIVE_MARKERS: [&str; 9] = [
    "perfect", "excellent", "highly", "very", "strong", "great", "ideal", "exactly", "definitely",
];

pub const NEGATIVE_MARKERS: [&str; 10] = [
    "might", "could", "perhaps", "maybe", "possibly", "somewhat", "slight", "minor", "weak", "not",
];

/// Score in tenths: neutral is 5/10, each marker moves it by 1/10.
const NEUTRAL_TENTHS: i64 = 5;
const MAX_TENTHS: i64 = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TitleMatch {
    start: usize,
    end: usize,
    candidate: usize,
}

#[derive(Debug, Default)]
struct Attribution {
    order: Vec<(usize, String)>,
    positions: HashMap<usize, usize>,
}

impl Attribution {
    fn emit(&mut self, candidate: usize, reasoning: String) {
        match self.positions.get(&candidate) {
            Some(&pos) => {
                let existing = &mut self.order[pos].1;
                if !existing.is_empty() && !reasoning.is_empty() {
                    existing.push('\n');
                }
                existing.push_str(&reasoning);
            }
            None => {
                self.positions.insert(candidate, self.order.len());
                self.order.push((candidate, reasoning));
            }
        }
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses `generated_text`, returning an empty list when no candidate is mentioned.
    pub fn parse(&self, generated_text: &str, candidates: &[Item]) -> Vec<Recommendation> {
        match self.parse_strict(generated_text, candidates) {
            Ok(recommendations) => recommendations,
            Err(e) => {
                debug!("Resolving unparseable generation output to no recommendations: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`ResponseParser::parse`], but reports text that mentions no candidate
    /// as [`RecommenderError::MalformedGenerationOutput`].
    pub fn parse_strict(
        &self,
        generated_text: &str,
        candidates: &[Item],
    ) -> Result<Vec<Recommendation>> {
        let mut attribution = Attribution::default();
        let mut current: Option<(usize, String)> = None;

        for line in generated_text.lines() {
            let mut cursor = 0;

            for found in find_titles(line, candidates) {
                if let Some((_, reasoning)) = current.as_mut() {
                    reasoning.push_str(&line[cursor..found.start]);
                }
                if let Some((candidate, reasoning)) = current.take() {
                    attribution.emit(candidate, reasoning.trim().to_string());
                }
                current = Some((found.candidate, String::new()));
                cursor = found.end;
            }

            if let Some((_, reasoning)) = current.as_mut() {
                reasoning.push_str(&line[cursor..]);
                reasoning.push('\n');
            }
        }

        if let Some((candidate, reasoning)) = current.take() {
            attribution.emit(candidate, reasoning.trim().to_string());
        }

        if attribution.order.is_empty() {
            return Err(RecommenderError::MalformedGenerationOutput);
        }

        let mut recommendations: Vec<Recommendation> = attribution
            .order
            .into_iter()
            .map(|(candidate, reasoning)| Recommendation {
                item: candidates[candidate].clone(),
                score: score_reasoning(&reasoning),
                reasoning: if reasoning.is_empty() { None } else { Some(reasoning) },
            })
            .collect();

        // stable: equal scores keep first-mention order
        recommendations.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(recommendations)
    }

    /// Prompt asking the generator to recommend `n` of `candidates` for `user_context`.
    pub fn build_prompt(&self, user_context: &str, candidates: &[Item], n: usize) -> String {
        let listing: Vec<String> = candidates
            .iter()
            .map(|item| format!("- {} ({}): {}", item.title, item.category, item.description))
            .collect();

        format!(
            "Given the following user context and items, recommend the top {} most relevant items. \
             Provide reasoning for each recommendation.\n\n\
             User Context:\n{}\n\n\
             Available Items:\n{}\n\n\
             Recommendations:",
            n,
            user_context,
            listing.join("\n")
        )
    }
}

/// Non-overlapping title occurrences in `line`, leftmost first, longest title on ties.
fn find_titles(line: &str, candidates: &[Item]) -> Vec<TitleMatch> {
    let mut matches: Vec<TitleMatch> = candidates
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.title.is_empty())
        .flat_map(|(candidate, item)| {
            line.match_indices(item.title.as_str()).map(move |(start, title)| TitleMatch {
                start,
                end: start + title.len(),
                candidate,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.end.cmp(&a.end))
            .then_with(|| a.candidate.cmp(&b.candidate))
    });

    let mut selected = Vec::with_capacity(matches.len());
    let mut last_end = 0;
    for found in matches {
        if found.start >= last_end {
            last_end = found.end;
            selected.push(found);
        }
    }
    selected
}

/// Marker-count score of a reasoning text, in `[0, 1]`.
pub fn score_reasoning(reasoning: &str) -> f32 {
    let mut tenths = NEUTRAL_TENTHS;

    for word in reasoning.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let word = word.to_lowercase();
        if POSITIVE_MARKERS.contains(&word.as_str()) {
            tenths += 1;
        } else if NEGATIVE_MARKERS.contains(&word.as_str()) {
            tenths -= 1;
        }
    }

    tenths.clamp(0, MAX_TENTHS) as f32 / MAX_TENTHS as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Item> {
        vec![
            Item::new("alpha", "AlphaWidget", "widgets"),
            Item::new("beta", "BetaGadget", "gadgets"),
            Item::new("gamma", "GammaTool", "tools"),
        ]
    }

    #[test]
    fn test_single_line_attribution() {
        let text = "AlphaWidget: this is an excellent and perfect fit. BetaGadget: this might possibly work.";
        let recs = ResponseParser::new().parse(text, &catalog());

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item.id, "alpha");
        assert!((recs[0].score - 0.7).abs() < 1e-6);
        assert_eq!(recs[1].item.id, "beta");
        assert!((recs[1].score - 0.3).abs() < 1e-6);
        assert_eq!(recs[1].reasoning.as_deref(), Some(": this might possibly work."));
    }

    #[test]
    fn test_multiline_blocks_accumulate_until_next_title() {
        let text = "1. GammaTool\nA strong choice.\nVery durable.\n2. AlphaWidget\nIt could help.\n";
        let recs = ResponseParser::new().parse(text, &catalog());

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item.id, "gamma");
        assert!((recs[0].score - 0.7).abs() < 1e-6);
        assert_eq!(recs[0].reasoning.as_deref(), Some("A strong choice.\nVery durable.\n2."));
        assert_eq!(recs[1].item.id, "alpha");
        assert!((recs[1].score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_markers_each_count() {
        assert!((score_reasoning("very very very good") - 0.8).abs() < 1e-6);
        assert!((score_reasoning("not not") - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_markers_are_case_insensitive_whole_words() {
        assert!((score_reasoning("EXCELLENT and Definitely") - 0.7).abs() < 1e-6);
        // "nothing" and "every" contain markers but are not markers
        assert!((score_reasoning("nothing every") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_score_is_clamped() {
        let glowing = "perfect ".repeat(12);
        assert_eq!(score_reasoning(&glowing), 1.0);
        let doubtful = "maybe ".repeat(12);
        assert_eq!(score_reasoning(&doubtful), 0.0);
        assert_eq!(score_reasoning(""), 0.5);
    }

    #[test]
    fn test_unmentioned_items_produce_nothing() {
        let recs = ResponseParser::new().parse("I have no idea what to suggest.", &catalog());
        assert!(recs.is_empty());

        let strict = ResponseParser::new().parse_strict("nothing here", &catalog());
        assert!(matches!(strict, Err(RecommenderError::MalformedGenerationOutput)));
    }

    #[test]
    fn test_text_before_first_title_is_ignored() {
        let text = "Here are my excellent picks:\nBetaGadget\nfine";
        let recs = ResponseParser::new().parse(text, &catalog());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item.id, "beta");
        assert_eq!(recs[0].score, 0.5);
    }

    #[test]
    fn test_repeated_mentions_merge_into_one_recommendation() {
        let text = "AlphaWidget is great.\nBetaGadget is weak.\nAlphaWidget again: ideal.";
        let recs = ResponseParser::new().parse(text, &catalog());
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item.id, "alpha");
        assert!((recs[0].score - 0.7).abs() < 1e-6);
        assert_eq!(recs[0].reasoning.as_deref(), Some("is great.\nagain: ideal."));
    }

    #[test]
    fn test_longest_overlapping_title_wins() {
        let items = vec![
            Item::new("short", "Widget", "w"),
            Item::new("long", "Widget Pro", "w"),
        ];
        let recs = ResponseParser::new().parse("Widget Pro: excellent", &items);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item.id, "long");
    }

    #[test]
    fn test_empty_titles_never_match() {
        let items = vec![Item::new("blank", "", "w")];
        assert!(ResponseParser::new().parse("anything at all", &items).is_empty());
    }

    #[test]
    fn test_equal_scores_keep_mention_order() {
        let text = "GammaTool\nBetaGadget\nAlphaWidget";
        let recs = ResponseParser::new().parse(text, &catalog());
        let ids: Vec<&str> = recs.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["gamma", "beta", "alpha"]);
        assert!(recs.iter().all(|r| r.reasoning.is_none()));
    }

    #[test]
    fn test_build_prompt_lists_candidates() {
        let items = vec![Item::new("alpha", "AlphaWidget", "widgets").with_description("small")];
        let prompt = ResponseParser::new().build_prompt("likes compact tools", &items, 3);
        assert!(prompt.contains("top 3 most relevant"));
        assert!(prompt.contains("User Context:\nlikes compact tools"));
        assert!(prompt.contains("- AlphaWidget (widgets): small"));
        assert!(prompt.ends_with("Recommendations:"));
    }
}
