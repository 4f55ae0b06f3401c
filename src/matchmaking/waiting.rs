//! Transient pool of participants waiting for a match

use crate::types::ParticipantId;
use std::collections::HashSet;

/// Insertion-ordered set of waiting participants
///
/// The order only matters for deterministic iteration; grouping shuffles or
/// buckets it anyway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitingSet {
    order: Vec<ParticipantId>,
    members: HashSet<ParticipantId>,
}

impl WaitingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant; returns false if they were already waiting
    pub fn insert(&mut self, participant: &str) -> bool {
        if !self.members.insert(participant.to_string()) {
            return false;
        }
        self.order.push(participant.to_string());
        true
    }

    /// Remove a participant; returns false if they were not waiting
    pub fn remove(&mut self, participant: &str) -> bool {
        if !self.members.remove(participant) {
            return false;
        }
        self.order.retain(|p| p != participant);
        true
    }

    pub fn contains(&self, participant: &str) -> bool {
        self.members.contains(participant)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.order.iter()
    }

    pub fn to_vec(&self) -> Vec<ParticipantId> {
        self.order.clone()
    }

    /// Empty the set, returning its members in insertion order
    pub fn drain(&mut self) -> Vec<ParticipantId> {
        self.members.clear();
        std::mem::take(&mut self.order)
    }

    /// Replace the contents; duplicates in `participants` are collapsed
    pub fn refill(&mut self, participants: impl IntoIterator<Item = ParticipantId>) {
        self.order.clear();
        self.members.clear();
        for participant in participants {
            self.insert(&participant);
        }
    }
}

impl FromIterator<ParticipantId> for WaitingSet {
    fn from_iter<I: IntoIterator<Item = ParticipantId>>(iter: I) -> Self {
        let mut set = Self::new();
        set.refill(iter);
        set
    }
}
