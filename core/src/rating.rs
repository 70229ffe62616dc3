//! Driver rating.

use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single review score in `[1, 5]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    /// Create a score.
    ///
    /// # Errors
    ///
    /// Returns a validation error outside `[1, 5]`.
    pub fn new(value: u8) -> Result<Self> {
        if !(1..=5).contains(&value) {
            return Err(DomainError::invalid("score", "must be between 1 and 5"));
        }
        Ok(Self(value))
    }

    /// Numeric value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// Aggregated reviews of a driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverRating {
    /// No review yet.
    #[default]
    Unrated,
    /// At least one review.
    Rated {
        /// Number of reviews.
        reviews: u32,
        /// Sum of all scores.
        score_sum: u32,
    },
}

impl DriverRating {
    /// Rebuild from stored counters; zero reviews means unrated.
    #[must_use]
    pub const fn from_counts(reviews: u32, score_sum: u32) -> Self {
        if reviews == 0 {
            Self::Unrated
        } else {
            Self::Rated { reviews, score_sum }
        }
    }

    /// Rating after one more review.
    #[must_use]
    pub const fn rate(self, score: Score) -> Self {
        let score = score.0 as u32;
        match self {
            Self::Unrated => Self::Rated {
                reviews: 1,
                score_sum: score,
            },
            Self::Rated { reviews, score_sum } => Self::Rated {
                reviews: reviews.saturating_add(1),
                score_sum: score_sum.saturating_add(score),
            },
        }
    }

    /// Mean score, `None` while unrated.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        match self {
            Self::Unrated => None,
            Self::Rated { reviews, score_sum } => {
                Some(f64::from(*score_sum) / f64::from(*reviews))
            }
        }
    }

    /// Review and score counters, zero while unrated.
    #[must_use]
    pub const fn counts(&self) -> (u32, u32) {
        match self {
            Self::Unrated => (0, 0),
            Self::Rated { reviews, score_sum } => (*reviews, *score_sum),
        }
    }
}

impl fmt::Display for DriverRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrated => write!(f, "No rating yet"),
            Self::Rated { reviews, score_sum } => write!(
                f,
                "{:.1} ({reviews} reviews)",
                f64::from(*score_sum) / f64::from(*reviews)
            ),
        }
    }
}
