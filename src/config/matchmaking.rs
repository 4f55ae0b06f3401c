//! Per match type matchmaking configuration

use crate::error::{MatchmakingError, Result};
use crate::types::DEFAULT_TICKS_PER_SECOND;
use serde::{Deserialize, Serialize};

/// Settings that drive one matchmaking engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    /// Exact size of every formed match
    pub max_players_per_match: usize,
    /// Ticks between two grouping passes
    pub matching_interval_ticks: u64,
    /// Players a match needs before its countdown starts
    pub min_players_to_start: usize,
    /// Countdown length in seconds
    pub countdown_duration_seconds: u64,
    /// Whether rank-bracket grouping starts enabled
    pub rank_range_enabled: bool,
    /// Logical ticks per second of the tick source
    pub ticks_per_second: u64,
    /// Delay before an ended match's published keys are cleared
    pub cleanup_delay_ticks: u64,
    /// Final seconds of a countdown that are announced every tick
    pub countdown_announce_seconds: u64,
    /// Keep participants outside every rank group in the queue instead of dropping them
    pub requeue_unranked: bool,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            max_players_per_match: 4,
            matching_interval_ticks: 20,
            min_players_to_start: 2,
            countdown_duration_seconds: 10,
            rank_range_enabled: false,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            cleanup_delay_ticks: 60, // 3 seconds
            countdown_announce_seconds: 5,
            requeue_unranked: false,
        }
    }
}

impl MatchmakingConfig {
    /// Config with the given match size and start threshold, defaults elsewhere
    pub fn with_sizes(max_players_per_match: usize, min_players_to_start: usize) -> Self {
        Self {
            max_players_per_match,
            min_players_to_start,
            ..Self::default()
        }
    }

    /// Countdown length in ticks
    pub fn countdown_ticks(&self) -> u64 {
        self.countdown_duration_seconds
            .saturating_mul(self.ticks_per_second)
    }

    /// Validate sizes and timings
    pub fn validate(&self) -> Result<()> {
        if self.max_players_per_match == 0 {
            return Err(MatchmakingError::configuration(
                "max_players_per_match must be greater than 0",
            )
            .into());
        }
        if self.min_players_to_start == 0 {
            return Err(MatchmakingError::configuration(
                "min_players_to_start must be greater than 0",
            )
            .into());
        }
        if self.min_players_to_start > self.max_players_per_match {
            return Err(MatchmakingError::configuration(format!(
                "min_players_to_start ({}) cannot be greater than max_players_per_match ({})",
                self.min_players_to_start, self.max_players_per_match
            ))
            .into());
        }
        if self.matching_interval_ticks == 0 {
            return Err(MatchmakingError::configuration(
                "matching_interval_ticks must be greater than 0",
            )
            .into());
        }
        if self.ticks_per_second == 0 {
            return Err(
                MatchmakingError::configuration("ticks_per_second must be greater than 0").into(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MatchmakingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.countdown_ticks(), 200);
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let config = MatchmakingConfig::with_sizes(2, 3);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_players_to_start (3)"));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        assert!(MatchmakingConfig::with_sizes(0, 0).validate().is_err());
        assert!(MatchmakingConfig::with_sizes(4, 0).validate().is_err());
        assert!(MatchmakingConfig {
            matching_interval_ticks: 0,
            ..MatchmakingConfig::default()
        }
        .validate()
        .is_err());
        assert!(MatchmakingConfig {
            ticks_per_second: 0,
            ..MatchmakingConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MatchmakingConfig =
            toml::from_str("max_players_per_match = 2\nmin_players_to_start = 2").unwrap();
        assert_eq!(config.max_players_per_match, 2);
        assert_eq!(config.countdown_duration_seconds, 10);
        assert!(!config.requeue_unranked);
    }
}
