//! Admin-mutable rank brackets used by rank-bucketed grouping

use crate::error::{MatchmakingError, Result};
use crate::rank::RankTable;
use crate::types::Score;
use serde::{Deserialize, Serialize};

/// Named bracket between two tiers
///
/// The bracket covers scores from the start tier's threshold up to and
/// including the end tier's threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankGroup {
    pub name: String,
    pub start_tier: String,
    pub end_tier: String,
}

impl RankGroup {
    /// Inclusive score range of this group under `table`
    pub fn score_range(&self, table: &RankTable) -> (Score, Score) {
        (
            table.score_for_tier(&self.start_tier),
            table.score_for_tier(&self.end_tier),
        )
    }

    pub fn contains(&self, table: &RankTable, score: Score) -> bool {
        let (start, end) = self.score_range(table);
        score >= start && score <= end
    }
}

/// Ordered rank groups plus the switch that turns rank-bucketing on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankGroupConfig {
    enabled: bool,
    groups: Vec<RankGroup>,
}

impl RankGroupConfig {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            groups: Vec::new(),
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Add a group at the end of the list
    ///
    /// Fails with a validation error when the name is taken, either tier is
    /// unknown, or no rank table is bound.
    pub fn add_group(
        &mut self,
        name: &str,
        start_tier: &str,
        end_tier: &str,
        table: Option<&RankTable>,
    ) -> Result<()> {
        validate_tiers(start_tier, end_tier, table)?;
        if self.find(name).is_some() {
            return Err(
                MatchmakingError::validation(format!("rank group '{}' already exists", name))
                    .into(),
            );
        }

        self.groups.push(RankGroup {
            name: name.to_string(),
            start_tier: start_tier.to_string(),
            end_tier: end_tier.to_string(),
        });
        Ok(())
    }

    /// Change the tiers of an existing group, keeping its position
    pub fn set_group(
        &mut self,
        name: &str,
        start_tier: &str,
        end_tier: &str,
        table: Option<&RankTable>,
    ) -> Result<()> {
        let index = self
            .groups
            .iter()
            .position(|group| group.name == name)
            .ok_or_else(|| MatchmakingError::GroupNotFound {
                name: name.to_string(),
            })?;
        validate_tiers(start_tier, end_tier, table)?;

        let group = &mut self.groups[index];
        group.start_tier = start_tier.to_string();
        group.end_tier = end_tier.to_string();
        Ok(())
    }

    /// Remove a group; unknown names are a no-op
    pub fn remove_group(&mut self, name: &str) -> Option<RankGroup> {
        let index = self.groups.iter().position(|group| group.name == name)?;
        Some(self.groups.remove(index))
    }

    pub fn list_groups(&self) -> &[RankGroup] {
        &self.groups
    }

    pub fn find(&self, name: &str) -> Option<&RankGroup> {
        self.groups.iter().find(|group| group.name == name)
    }
}

fn validate_tiers(start_tier: &str, end_tier: &str, table: Option<&RankTable>) -> Result<()> {
    let Some(table) = table else {
        return Err(MatchmakingError::validation("no rank system is bound to this match type").into());
    };
    for tier in [start_tier, end_tier] {
        if !table.contains(tier) {
            return Err(MatchmakingError::validation(format!("unknown tier '{}'", tier)).into());
        }
    }
    Ok(())
}
