//! Headline model representing a single news item retrieved for a symbol.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A news headline as retrieved from the news source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    /// Ticker symbol this headline was retrieved for
    pub symbol: String,

    /// The headline text itself (the scored content)
    pub text: String,

    /// Publisher or wire service
    #[serde(default)]
    pub source: String,

    /// When the article was published
    pub created_at: DateTime<Utc>,
}

impl Headline {
    pub fn new(symbol: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            text: text.into(),
            source: String::new(),
            created_at,
        }
    }

    /// Whether this headline falls inside a trailing lookback window ending at `now`.
    pub fn within_window(&self, now: DateTime<Utc>, lookback_days: i64) -> bool {
        let start = now - Duration::days(lookback_days);
        self.created_at >= start && self.created_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_window() {
        let now = Utc::now();
        let fresh = Headline::new("SPY", "Stocks rally", now - Duration::days(2));
        let stale = Headline::new("SPY", "Old news", now - Duration::days(10));

        assert!(fresh.within_window(now, 4));
        assert!(!stale.within_window(now, 4));
    }
}
