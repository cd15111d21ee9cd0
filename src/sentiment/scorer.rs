//! Sentiment aggregation over a batch of headlines.
//!
//! The oracle (a pretrained financial classifier, remote or lexicon-backed)
//! produces one raw logit vector per headline; this module collapses the
//! batch into a single verdict: sum the logits element-wise, softmax the sum,
//! take the most probable class. Summing rather than averaging is deliberate:
//! many headlines with weak but consistent signal outweigh a few headlines
//! with strong signal.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::model::SentimentModel;

/// Sentiment class. The order is fixed: aggregation indexes into
/// [`CLASSES`] positionally, and the empty-batch fallback is the last entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// The fixed class enumeration, in oracle output order.
pub const CLASSES: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-headline class logits, one entry per [`CLASSES`] position.
pub type ClassLogits = [f64; 3];

/// Aggregate sentiment verdict for a headline batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Maximum class probability, in [0, 1]
    pub confidence: f64,

    /// The class achieving that maximum
    pub label: Sentiment,
}

impl Verdict {
    /// Degenerate verdict for an empty batch: confidence 0 and the last
    /// class in the enumeration. Callers branch on the label string, so
    /// this exact pair is part of the contract.
    pub fn empty_batch() -> Self {
        Self {
            confidence: 0.0,
            label: CLASSES[CLASSES.len() - 1],
        }
    }

    pub fn is_actionable(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.4})", self.label, self.confidence)
    }
}

/// Numerically stable softmax: subtracting the max logit keeps the
/// exponentials bounded even when summed logits over a large batch are large.
fn softmax(logits: &ClassLogits) -> [f64; 3] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0f64; 3];
    let mut total = 0.0;
    for (o, &l) in out.iter_mut().zip(logits.iter()) {
        *o = (l - max).exp();
        total += *o;
    }
    for o in out.iter_mut() {
        *o /= total;
    }
    out
}

/// Probability distribution over [`CLASSES`] for a non-empty batch:
/// element-wise sum of the per-headline logits, then softmax.
pub fn aggregate_distribution(per_headline: &[ClassLogits]) -> [f64; 3] {
    let mut summed = [0.0f64; 3];
    for logits in per_headline {
        for (acc, &l) in summed.iter_mut().zip(logits.iter()) {
            *acc += l;
        }
    }
    softmax(&summed)
}

/// Collapse per-headline logits into a single verdict.
///
/// Ties between classes resolve to the first index scanned, which downstream
/// policy logic treats as authoritative.
pub fn aggregate(per_headline: &[ClassLogits]) -> Verdict {
    let probs = aggregate_distribution(per_headline);

    let mut best = 0usize;
    for (i, &p) in probs.iter().enumerate().skip(1) {
        if p > probs[best] {
            best = i;
        }
    }

    Verdict {
        confidence: probs[best],
        label: CLASSES[best],
    }
}

/// Decode raw headline bytes into text, failing the whole batch on the first
/// non-UTF-8 entry. There is no per-headline fallback.
pub fn decode_headlines(raw: &[Vec<u8>]) -> Result<Vec<String>> {
    raw.iter()
        .enumerate()
        .map(|(i, bytes)| {
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .with_context(|| format!("headline {} is not decodable as UTF-8 text", i))
        })
        .collect()
}

/// Sentiment scorer: an immutable oracle handle plus the aggregation above.
///
/// Holds no per-call state, so one instance is safely shared across ticks.
pub struct Scorer<M> {
    model: M,
}

impl<M: SentimentModel> Scorer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Score a batch of headlines into one aggregate verdict.
    ///
    /// An empty batch short-circuits to [`Verdict::empty_batch`] without
    /// touching the oracle.
    pub async fn estimate(&self, headlines: &[String]) -> Result<Verdict> {
        if headlines.is_empty() {
            return Ok(Verdict::empty_batch());
        }

        let logits = self.model.class_logits(headlines).await?;
        if logits.len() != headlines.len() {
            bail!(
                "oracle returned {} logit rows for {} headlines",
                logits.len(),
                headlines.len()
            );
        }

        Ok(aggregate(&logits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::model::MockModel;

    const TOLERANCE: f64 = 1e-6;

    fn uniform_distance(probs: &[f64; 3]) -> f64 {
        probs.iter().map(|p| (p - 1.0 / 3.0).abs()).sum()
    }

    #[test]
    fn test_empty_batch_fallback_exact() {
        let verdict = Verdict::empty_batch();
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.label, Sentiment::Neutral);
        assert_eq!(verdict.label.as_str(), "neutral");
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let logits = vec![[1.2, -0.4, 0.3], [0.1, 0.9, -2.0], [3.3, 3.3, 3.3]];
        let probs = aggregate_distribution(&logits);
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < TOLERANCE);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_permutation_invariance() {
        let forward = vec![[2.0, -1.0, 0.5], [-0.5, 1.5, 0.0], [0.2, 0.2, 3.0]];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = aggregate(&forward);
        let b = aggregate(&reversed);
        assert_eq!(a.label, b.label);
        assert!((a.confidence - b.confidence).abs() < TOLERANCE);
    }

    #[test]
    fn test_all_positive_batch_is_positive() {
        let logits = vec![[4.0, -1.0, 0.0]; 8];
        let verdict = aggregate(&logits);
        assert_eq!(verdict.label, Sentiment::Positive);
        assert!(verdict.confidence > 0.99);
    }

    #[test]
    fn test_opposing_headlines_trend_toward_uniform() {
        let positive = [3.0, -3.0, 0.0];
        let negative = [-3.0, 3.0, 0.0];

        let combined = aggregate_distribution(&[positive, negative]);
        let pos_alone = aggregate_distribution(&[positive]);
        let neg_alone = aggregate_distribution(&[negative]);

        assert!(uniform_distance(&combined) < uniform_distance(&pos_alone));
        assert!(uniform_distance(&combined) < uniform_distance(&neg_alone));
    }

    #[test]
    fn test_tie_breaks_to_first_class() {
        // Positive and negative logits cancel exactly; neutral matches too.
        let verdict = aggregate(&[[1.0, 1.0, 1.0]]);
        assert_eq!(verdict.label, Sentiment::Positive);
    }

    #[test]
    fn test_softmax_stable_for_large_sums() {
        // Summed logits far beyond exp() overflow territory.
        let logits = vec![[500.0, 100.0, 50.0]; 10];
        let probs = aggregate_distribution(&logits);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < TOLERANCE);
        assert_eq!(aggregate(&logits).label, Sentiment::Positive);
    }

    #[test]
    fn test_sum_not_average() {
        // One strong headline vs. three weak-but-consistent ones: the sum
        // lets the consistent batch reach higher confidence.
        let strong = aggregate_distribution(&[[2.0, 0.0, 0.0]]);
        let consistent = aggregate_distribution(&[[2.0, 0.0, 0.0]; 3]);
        assert!(consistent[0] > strong[0]);
    }

    #[test]
    fn test_decode_headlines_rejects_invalid_utf8() {
        let raw = vec![b"Stocks rally".to_vec(), vec![0xff, 0xfe, 0x41]];
        let err = decode_headlines(&raw).unwrap_err();
        assert!(err.to_string().contains("headline 1"));
    }

    #[test]
    fn test_decode_headlines_ok() {
        let raw = vec![b"Shares jump on earnings".to_vec()];
        let decoded = decode_headlines(&raw).unwrap();
        assert_eq!(decoded, vec!["Shares jump on earnings".to_string()]);
    }

    #[tokio::test]
    async fn test_scorer_empty_batch_skips_oracle() {
        // MockModel panics on any call; an empty batch must never reach it.
        let scorer = Scorer::new(MockModel::panicking());
        let verdict = scorer.estimate(&[]).await.unwrap();
        assert_eq!(verdict, Verdict::empty_batch());
    }

    #[tokio::test]
    async fn test_scorer_aggregates_oracle_logits() {
        let scorer = Scorer::new(MockModel::returning(vec![[5.0, 0.0, 0.0], [4.0, 0.0, 0.0]]));
        let batch = vec!["Record earnings".to_string(), "Guidance raised".to_string()];
        let verdict = scorer.estimate(&batch).await.unwrap();
        assert_eq!(verdict.label, Sentiment::Positive);
        assert!(verdict.confidence > 0.99);
    }

    #[tokio::test]
    async fn test_scorer_rejects_row_count_mismatch() {
        let scorer = Scorer::new(MockModel::returning(vec![[1.0, 0.0, 0.0]]));
        let batch = vec!["a".to_string(), "b".to_string()];
        assert!(scorer.estimate(&batch).await.is_err());
    }

    #[test]
    fn test_label_round_trip() {
        for class in CLASSES {
            assert_eq!(Sentiment::from_str(class.as_str()), Some(class));
        }
        assert_eq!(Sentiment::from_str("nagative"), None);
    }
}
