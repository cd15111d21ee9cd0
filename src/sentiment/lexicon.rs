//! Offline lexicon-backed oracle.
//!
//! Scores headlines against financial positive/negative word lists and
//! emits logits in the same three-class layout as the remote classifier.
//! Deterministic and dependency-free, so backtests and tests run without
//! the inference service.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use super::model::SentimentModel;
use super::scorer::ClassLogits;

const POSITIVE_WORDS: &[&str] = &[
    "surge", "surges", "surged", "rally", "rallies", "rallied", "gain", "gains", "gained",
    "jump", "jumps", "jumped", "soar", "soars", "soared", "climb", "climbs", "climbed",
    "record", "beat", "beats", "upgrade", "upgraded", "strong", "growth", "profit",
    "profits", "profitable", "bullish", "outperform", "outperforms", "raised", "exceeds",
    "breakthrough", "boom", "upbeat", "optimistic", "rebound", "rebounds",
];

const NEGATIVE_WORDS: &[&str] = &[
    "plunge", "plunges", "plunged", "crash", "crashes", "crashed", "fall", "falls", "fell",
    "drop", "drops", "dropped", "slump", "slumps", "slumped", "tumble", "tumbles", "tumbled",
    "loss", "losses", "miss", "misses", "missed", "downgrade", "downgraded", "weak",
    "bearish", "underperform", "lawsuit", "fraud", "scandal", "bankruptcy", "recession",
    "layoffs", "warning", "cuts", "default", "selloff", "pessimistic",
];

/// Per-hit logit contribution. Two hits in one headline already dominate the
/// neutral floor after softmax.
const HIT_WEIGHT: f64 = 1.25;

/// Residual neutral logit for headlines with at least one lexicon hit.
const NEUTRAL_FLOOR: f64 = 0.25;

/// Deterministic three-class oracle over financial word lists.
pub struct LexiconModel {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl LexiconModel {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
        }
    }

    fn headline_logits(&self, text: &str) -> ClassLogits {
        let lowered = text.to_lowercase();
        let mut positive_hits = 0.0f64;
        let mut negative_hits = 0.0f64;

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if self.positive.contains(word) {
                positive_hits += 1.0;
            } else if self.negative.contains(word) {
                negative_hits += 1.0;
            }
        }

        if positive_hits == 0.0 && negative_hits == 0.0 {
            // No signal at all: neutral wins outright.
            return [0.0, 0.0, 1.0];
        }

        [
            positive_hits * HIT_WEIGHT,
            negative_hits * HIT_WEIGHT,
            NEUTRAL_FLOOR,
        ]
    }
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentModel for LexiconModel {
    async fn class_logits(&self, batch: &[String]) -> Result<Vec<ClassLogits>> {
        Ok(batch.iter().map(|text| self.headline_logits(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::scorer::{Scorer, Sentiment};

    #[tokio::test]
    async fn test_positive_headline() {
        let scorer = Scorer::new(LexiconModel::new());
        let batch = vec!["Stock surges after record earnings.".to_string()];
        let verdict = scorer.estimate(&batch).await.unwrap();
        assert_eq!(verdict.label, Sentiment::Positive);
        assert!(verdict.confidence > 0.5);
    }

    #[tokio::test]
    async fn test_negative_headline() {
        let scorer = Scorer::new(LexiconModel::new());
        let batch = vec!["Shares plunge amid fraud lawsuit".to_string()];
        let verdict = scorer.estimate(&batch).await.unwrap();
        assert_eq!(verdict.label, Sentiment::Negative);
        assert!(verdict.confidence > 0.5);
    }

    #[tokio::test]
    async fn test_no_signal_is_neutral() {
        let scorer = Scorer::new(LexiconModel::new());
        let batch = vec!["The meeting is scheduled for tomorrow.".to_string()];
        let verdict = scorer.estimate(&batch).await.unwrap();
        assert_eq!(verdict.label, Sentiment::Neutral);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let model = LexiconModel::new();
        let a = model.headline_logits("STOCKS RALLY!");
        let b = model.headline_logits("stocks rally");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hit_counts_scale_logits() {
        let model = LexiconModel::new();
        let single = model.headline_logits("Shares gain");
        let double = model.headline_logits("Shares gain in record rally");
        assert!(double[0] > single[0]);
    }
}
