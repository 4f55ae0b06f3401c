//! Rank score storage over the external registry
//!
//! Scores are stored under `<rank_key>:<participant>` so several rank systems
//! can share one registry.

use crate::error::Result;
use crate::registry::ExternalRegistry;
use crate::types::{ParticipantId, Score};
use std::sync::Arc;

/// Read/write access to the scores of one rank system
#[derive(Clone)]
pub struct RankStore {
    registry: Arc<dyn ExternalRegistry>,
    rank_key: String,
}

impl RankStore {
    pub fn new(registry: Arc<dyn ExternalRegistry>, rank_key: impl Into<String>) -> Self {
        Self {
            registry,
            rank_key: rank_key.into(),
        }
    }

    pub fn rank_key(&self) -> &str {
        &self.rank_key
    }

    fn key_for(&self, participant: &str) -> String {
        format!("{}:{}", self.rank_key, participant)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.rank_key)
    }

    /// Stored score, `None` when the participant has never been scored
    pub fn get(&self, participant: &str) -> Result<Option<Score>> {
        self.registry.get(&self.key_for(participant))
    }

    pub fn set(&self, participant: &str, score: Score) -> Result<()> {
        self.registry.set(&self.key_for(participant), score)
    }

    pub fn remove(&self, participant: &str) -> Result<()> {
        self.registry.remove(&self.key_for(participant))
    }

    /// Every participant with a stored score, in registry enumeration order
    ///
    /// Any key under `<rank_key>:` counts, including per-player keys published
    /// by an engine for a participant named `<rank_key>`. Engines refuse such
    /// participant ids.
    pub fn participants(&self) -> Result<Vec<(ParticipantId, Score)>> {
        let prefix = self.prefix();
        let mut entries = Vec::new();
        for key in self.registry.keys()? {
            let Some(participant) = key.strip_prefix(&prefix) else {
                continue;
            };
            if let Some(score) = self.registry.get(&key)? {
                entries.push((participant.to_string(), score));
            }
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for RankStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankStore")
            .field("rank_key", &self.rank_key)
            .finish_non_exhaustive()
    }
}
