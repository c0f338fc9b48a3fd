//! Search configuration for the router.

use chrono::Duration;
use serde::Deserialize;

/// Configuration parameters for journey search.
///
/// Missing fields take their default when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of rounds (a journey with `k` rides needs `k` rounds).
    pub max_rounds: usize,

    /// Maximum number of journeys to return.
    pub max_results: usize,

    /// Minimum time between alighting from one vehicle and boarding
    /// another at the same stop (seconds).
    pub min_connection_secs: u32,

    /// How many days past the requested one a trip lookup may search.
    pub lookahead_days: u32,
}

impl SearchConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(max_rounds: usize, max_results: usize, min_connection_secs: u32, lookahead_days: u32) -> Self {
        Self {
            max_rounds,
            max_results,
            min_connection_secs,
            lookahead_days,
        }
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the minimum connection time as a Duration.
    pub fn min_connection(&self) -> Duration {
        Duration::seconds(i64::from(self.min_connection_secs))
    }

    /// Returns the lookup horizon as a Duration.
    pub fn lookahead(&self) -> Duration {
        Duration::days(i64::from(self.lookahead_days))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            max_results: 10,
            min_connection_secs: 120,
            lookahead_days: 7,
        }
    }
}
