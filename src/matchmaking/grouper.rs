//! Grouping algorithms turning the waiting pool into full matches
//!
//! Both strategies are pure: they take the waiting participants by value and
//! return the groups to form plus whoever keeps waiting. Match creation and
//! state publication stay with the engine.

use crate::matchmaking::groups::RankGroup;
use crate::rank::RankTable;
use crate::types::{ParticipantId, Score};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How one grouping cycle slices the waiting pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupingStrategy {
    /// Uniform shuffle, then fixed-size slices
    Random,
    /// Bucket by rank group, then fixed-size slices per bucket
    ByRank,
}

impl GroupingStrategy {
    /// Strategy for a cycle: rank-bucketing needs both the switch and a rank system
    pub fn select(rank_matching_enabled: bool, has_rank_system: bool) -> Self {
        if rank_matching_enabled && has_rank_system {
            GroupingStrategy::ByRank
        } else {
            GroupingStrategy::Random
        }
    }
}

/// Players that will become one match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormedGroup {
    pub players: Vec<ParticipantId>,
    pub rank_group: Option<String>,
}

/// Result of one grouping cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingOutcome {
    pub formed: Vec<FormedGroup>,
    /// Participants that keep waiting
    pub remaining: Vec<ParticipantId>,
    /// Participants whose score fell in no rank group
    pub unranked: Vec<ParticipantId>,
}

/// Shuffle the pool and cut it into groups of exactly `max_players`
///
/// `waiting.len() % max_players` participants remain.
pub fn group_random<R>(
    mut waiting: Vec<ParticipantId>,
    max_players: usize,
    rng: &mut R,
) -> GroupingOutcome
where
    R: Rng + ?Sized,
{
    if max_players == 0 {
        return GroupingOutcome {
            remaining: waiting,
            ..GroupingOutcome::default()
        };
    }

    waiting.shuffle(rng);
    let (formed, remaining) = slice_full(waiting, max_players, None);
    GroupingOutcome {
        formed,
        remaining,
        unranked: Vec::new(),
    }
}

/// Bucket the pool by rank group, then cut each bucket into groups of `max_players`
///
/// A participant belongs to the first group, in configured order, whose range
/// contains their score. Bucket leftovers are kept in group order; participants
/// outside every group are reported as unranked.
pub fn group_by_rank<F>(
    waiting: Vec<ParticipantId>,
    groups: &[RankGroup],
    table: &RankTable,
    score_of: F,
    max_players: usize,
) -> GroupingOutcome
where
    F: Fn(&str) -> Score,
{
    let mut buckets: Vec<Vec<ParticipantId>> = vec![Vec::new(); groups.len()];
    let mut unranked = Vec::new();

    for participant in waiting {
        let score = score_of(&participant);
        match groups.iter().position(|group| group.contains(table, score)) {
            Some(index) => buckets[index].push(participant),
            None => unranked.push(participant),
        }
    }

    let mut outcome = GroupingOutcome {
        unranked,
        ..GroupingOutcome::default()
    };
    if max_players == 0 {
        outcome.remaining = buckets.into_iter().flatten().collect();
        return outcome;
    }

    for (group, bucket) in groups.iter().zip(buckets) {
        let (formed, leftover) = slice_full(bucket, max_players, Some(&group.name));
        outcome.formed.extend(formed);
        outcome.remaining.extend(leftover);
    }
    outcome
}

/// Split off consecutive full slices, returning them and the short tail
fn slice_full(
    players: Vec<ParticipantId>,
    max_players: usize,
    rank_group: Option<&str>,
) -> (Vec<FormedGroup>, Vec<ParticipantId>) {
    let full = players.len() / max_players * max_players;
    let mut players = players;
    let leftover = players.split_off(full);

    let formed = players
        .chunks(max_players)
        .map(|chunk| FormedGroup {
            players: chunk.to_vec(),
            rank_group: rank_group.map(str::to_string),
        })
        .collect();
    (formed, leftover)
}
