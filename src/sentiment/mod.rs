//! Sentiment scoring: the aggregation core plus pluggable oracles.

mod lexicon;
mod model;
mod scorer;

pub use lexicon::LexiconModel;
pub use model::{RemoteModel, SentimentModel};
pub use scorer::{
    aggregate, aggregate_distribution, decode_headlines, ClassLogits, Scorer, Sentiment, Verdict,
    CLASSES,
};
