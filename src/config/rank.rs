//! Rank system and rank group configuration

use crate::error::{MatchmakingError, Result};
use crate::types::Score;
use serde::{Deserialize, Serialize};

/// One rank system: a tier table stored under its own registry key prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSystemSettings {
    /// Display name, also used to reference the system from match types
    pub title: String,
    /// Prefix of score keys and tier labels
    pub rank_key: String,
    /// Tier names, lowest first
    pub tiers: Vec<String>,
    /// Minimum score of each tier, strictly increasing
    pub thresholds: Vec<Score>,
}

impl Default for RankSystemSettings {
    fn default() -> Self {
        Self {
            title: "Ranked".to_string(),
            rank_key: "ranked".to_string(),
            tiers: vec![
                "Bronze".to_string(),
                "Silver".to_string(),
                "Gold".to_string(),
            ],
            thresholds: vec![0, 100, 300],
        }
    }
}

impl RankSystemSettings {
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            return Err(MatchmakingError::configuration("rank system title cannot be empty").into());
        }
        if self.rank_key.is_empty() || self.rank_key.contains(':') {
            return Err(MatchmakingError::configuration(format!(
                "rank system '{}' has invalid rank key '{}'",
                self.title, self.rank_key
            ))
            .into());
        }
        Ok(())
    }
}

/// Initial rank group of a match type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankGroupSettings {
    pub name: String,
    pub start_tier: String,
    pub end_tier: String,
}

impl RankGroupSettings {
    pub fn new(
        name: impl Into<String>,
        start_tier: impl Into<String>,
        end_tier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            start_tier: start_tier.into(),
            end_tier: end_tier.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rank_system_is_valid() {
        let settings = RankSystemSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.tiers.len(), settings.thresholds.len());
    }

    #[test]
    fn test_rank_key_with_separator_is_rejected() {
        let settings = RankSystemSettings {
            rank_key: "ranked:solo".to_string(),
            ..RankSystemSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
