//! Rank tier table and score/tier mapping

use crate::error::{MatchmakingError, Result};
use crate::types::Score;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named rank bracket with its minimum score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTier {
    pub name: String,
    pub threshold: Score,
}

/// Ordered tiers with strictly increasing thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankTable {
    tiers: Vec<RankTier>,
}

impl RankTable {
    /// Build a table from parallel name and threshold lists
    ///
    /// Fails with a configuration error when the lists differ in length, are
    /// empty, repeat a tier name, or the thresholds are not strictly increasing.
    pub fn new(names: Vec<String>, thresholds: Vec<Score>) -> Result<Self> {
        if names.len() != thresholds.len() {
            return Err(MatchmakingError::configuration(format!(
                "{} tier names but {} thresholds",
                names.len(),
                thresholds.len()
            ))
            .into());
        }
        if names.is_empty() {
            return Err(MatchmakingError::configuration("rank table has no tiers").into());
        }

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(
                    MatchmakingError::configuration(format!("duplicate tier name '{}'", name))
                        .into(),
                );
            }
        }

        if let Some(pair) = thresholds.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(MatchmakingError::configuration(format!(
                "tier thresholds must be strictly increasing ({} is followed by {})",
                pair[0], pair[1]
            ))
            .into());
        }

        let tiers = names
            .into_iter()
            .zip(thresholds)
            .map(|(name, threshold)| RankTier { name, threshold })
            .collect();

        Ok(Self { tiers })
    }

    /// Tier for a score: the highest tier whose threshold is at or below it
    ///
    /// Scores below every threshold fall back to the lowest tier.
    pub fn tier_for_score(&self, score: Score) -> &RankTier {
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.threshold <= score)
            .unwrap_or(&self.tiers[0])
    }

    /// Threshold of a named tier, 0 when the name is unknown
    pub fn score_for_tier(&self, name: &str) -> Score {
        self.tier(name).map(|tier| tier.threshold).unwrap_or(0)
    }

    pub fn tier(&self, name: &str) -> Option<&RankTier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tier(name).is_some()
    }

    /// Tier names in ascending threshold order
    pub fn names(&self) -> Vec<String> {
        self.tiers.iter().map(|tier| tier.name.clone()).collect()
    }

    pub fn tiers(&self) -> &[RankTier] {
        &self.tiers
    }

    pub fn lowest(&self) -> &RankTier {
        &self.tiers[0]
    }
}
