//! Strategies for combining the document counts of merged terms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SemsearchError;

/// How the counts of a term found in several result sets are combined.
///
/// Counts `<= 0` mean "unknown" and never take part in the combination.
/// When no input has a known count the combined count is `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountsStrategy {
    /// The first known count, in input order.
    #[default]
    First,
    /// The largest known count.
    Max,
    /// The smallest known count.
    Min,
    /// The sum of the known counts.
    Sum,
}

impl CountsStrategy {
    /// Combine `counts` according to this strategy.
    pub fn combine<I>(self, counts: I) -> i64
    where
        I: IntoIterator<Item = i64>,
    {
        let mut known = counts.into_iter().filter(|&count| count > 0);
        match self {
            CountsStrategy::First => known.next().unwrap_or(0),
            CountsStrategy::Max => known.max().unwrap_or(0),
            CountsStrategy::Min => known.min().unwrap_or(0),
            CountsStrategy::Sum => known.sum(),
        }
    }
}

impl fmt::Display for CountsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CountsStrategy::First => "first",
            CountsStrategy::Max => "max",
            CountsStrategy::Min => "min",
            CountsStrategy::Sum => "sum",
        };
        f.write_str(name)
    }
}

impl FromStr for CountsStrategy {
    type Err = SemsearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(CountsStrategy::First),
            "max" => Ok(CountsStrategy::Max),
            "min" => Ok(CountsStrategy::Min),
            "sum" => Ok(CountsStrategy::Sum),
            other => Err(SemsearchError::invalid_argument(format!(
                "unknown counts strategy: {other}"
            ))),
        }
    }
}
