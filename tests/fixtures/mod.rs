//! Test fixtures and collaborator doubles for integration testing

#![allow(dead_code)]

use match_hall::config::{MatchmakingConfig, RankGroupSettings};
use match_hall::error::{MatchmakingError, Result};
use match_hall::{
    ExternalRegistry, InMemoryDirectory, InMemoryRegistry, MatchmakingEngine, RankSystem,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Registry that rejects writes to keys ending in a given suffix
///
/// Reads and every other key go through to an in-memory registry, so a test
/// can break one published key and check the rest keeps flowing.
#[derive(Debug)]
pub struct FailingRegistry {
    inner: InMemoryRegistry,
    failing_suffix: String,
    failures: AtomicUsize,
}

impl FailingRegistry {
    pub fn new(failing_suffix: &str) -> Self {
        Self {
            inner: InMemoryRegistry::new(),
            failing_suffix: failing_suffix.to_string(),
            failures: AtomicUsize::new(0),
        }
    }

    /// Number of rejected calls so far
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self, key: &str) -> Result<()> {
        if key.ends_with(&self.failing_suffix) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(MatchmakingError::StoreUnavailable {
                message: format!("write to {} rejected", key),
            }
            .into());
        }
        Ok(())
    }
}

impl ExternalRegistry for FailingRegistry {
    fn set(&self, key: &str, value: i64) -> Result<()> {
        self.check(key)?;
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<i64>> {
        self.inner.get(key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check(key)?;
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys()
    }
}

/// Shared collaborators plus a Bronze/Silver/Gold rank system
pub struct TestBed {
    pub registry: Arc<InMemoryRegistry>,
    pub directory: Arc<InMemoryDirectory>,
    pub rank_system: Arc<RankSystem>,
}

impl TestBed {
    pub fn new() -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let rank_system = Arc::new(
            RankSystem::from_tiers(
                "Ranked",
                "ranked",
                vec!["Bronze".into(), "Silver".into(), "Gold".into()],
                vec![0, 100, 300],
                registry.clone(),
                directory.clone(),
            )
            .expect("valid tier table"),
        );

        Self {
            registry,
            directory,
            rank_system,
        }
    }

    /// Seeded engine with random grouping
    pub fn engine(&self, title: &str, max: usize, min: usize) -> MatchmakingEngine {
        MatchmakingEngine::new(
            title,
            MatchmakingConfig::with_sizes(max, min),
            None,
            self.registry.clone(),
            self.directory.clone(),
        )
        .expect("valid engine config")
        .with_seed(7)
    }

    /// Seeded engine bracketed by `low` (Bronze-Silver) and `high` (Silver-Gold)
    pub fn ranked_engine(&self, title: &str, max: usize, min: usize) -> MatchmakingEngine {
        let mut config = MatchmakingConfig::with_sizes(max, min);
        config.rank_range_enabled = true;

        MatchmakingEngine::new(
            title,
            config,
            Some(self.rank_system.clone()),
            self.registry.clone(),
            self.directory.clone(),
        )
        .and_then(|engine| {
            engine.with_rank_groups(&[
                RankGroupSettings::new("low", "Bronze", "Silver"),
                RankGroupSettings::new("high", "Silver", "Gold"),
            ])
        })
        .expect("valid ranked engine")
        .with_seed(7)
    }

    /// Connect and enqueue every participant
    pub fn join_all(&self, engine: &mut MatchmakingEngine, participants: &[String]) {
        for participant in participants {
            self.directory.connect(participant);
            engine.join(participant).expect("join succeeds");
        }
    }

    /// Give a participant a score before they queue
    pub fn score(&self, participant: &str, score: i64) {
        self.directory.connect(participant);
        self.rank_system.set_score(participant, score);
    }

    pub fn published(&self, key: &str) -> Option<i64> {
        self.registry.get(key).expect("registry available")
    }
}

/// `count` participant names with a common prefix
pub fn participants(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Tick an engine through `from..=to`
pub fn run_ticks(engine: &mut MatchmakingEngine, from: u64, to: u64) {
    for tick in from..=to {
        engine.tick(tick);
    }
}
