//! Rank system: tier table, score persistence and tier label synchronization
//!
//! A rank system never fails its callers. Store outages make reads fall back to
//! 0 and drop writes with a warning; directory outages skip label updates.

use crate::directory::ParticipantDirectory;
use crate::error::Result;
use crate::rank::store::RankStore;
use crate::rank::tier::RankTable;
use crate::registry::ExternalRegistry;
use crate::types::{Notice, ParticipantId, Score, Standing};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Label attached to participants whose tier is not known yet
const UNKNOWN_TIER: &str = "unknown";

pub struct RankSystem {
    title: String,
    table: RankTable,
    store: RankStore,
    directory: Arc<dyn ParticipantDirectory>,
    /// Last score this system wrote or observed per participant
    last_known: RwLock<HashMap<ParticipantId, Score>>,
}

impl RankSystem {
    pub fn new(
        title: impl Into<String>,
        rank_key: impl Into<String>,
        table: RankTable,
        registry: Arc<dyn ExternalRegistry>,
        directory: Arc<dyn ParticipantDirectory>,
    ) -> Self {
        Self {
            title: title.into(),
            table,
            store: RankStore::new(registry, rank_key),
            directory,
            last_known: RwLock::new(HashMap::new()),
        }
    }

    /// Build the tier table and the system in one step
    pub fn from_tiers(
        title: impl Into<String>,
        rank_key: impl Into<String>,
        tier_names: Vec<String>,
        thresholds: Vec<Score>,
        registry: Arc<dyn ExternalRegistry>,
        directory: Arc<dyn ParticipantDirectory>,
    ) -> Result<Self> {
        let table = RankTable::new(tier_names, thresholds)?;
        Ok(Self::new(title, rank_key, table, registry, directory))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rank_key(&self) -> &str {
        self.store.rank_key()
    }

    pub fn table(&self) -> &RankTable {
        &self.table
    }

    pub fn tier_for_score(&self, score: Score) -> &str {
        &self.table.tier_for_score(score).name
    }

    pub fn score_for_tier(&self, name: &str) -> Score {
        self.table.score_for_tier(name)
    }

    /// Tier names in ascending threshold order
    pub fn tier_names(&self) -> Vec<String> {
        self.table.names()
    }

    /// Label carried by members of a tier
    pub fn label_for(&self, tier: &str) -> String {
        format!("{}:{}", self.rank_key(), tier)
    }

    /// Current score, 0 when absent or when the store cannot be read
    pub fn score(&self, participant: &str) -> Score {
        match self.store.get(participant) {
            Ok(score) => score.unwrap_or(0),
            Err(e) => {
                warn!(
                    "[{}] Failed to read score of '{}', using 0: {}",
                    self.title, participant, e
                );
                0
            }
        }
    }

    /// Store a new score and move the participant to the matching tier
    ///
    /// The stored value never sits below the floor of its own tier. Returns the
    /// value that was (or would have been) stored. When the store cannot be
    /// read or written, labels and notices are left alone for `reconcile`.
    pub fn set_score(&self, participant: &str, new_score: Score) -> Score {
        let clamped = self.clamp(new_score);
        let previous = match self.store.get(participant) {
            Ok(stored) => stored.unwrap_or(0),
            Err(e) => {
                warn!(
                    "[{}] Dropped score write for '{}' ({}), current score unreadable: {}",
                    self.title, participant, clamped, e
                );
                return clamped;
            }
        };
        if let Err(e) = self.write_score(participant, clamped, previous) {
            warn!(
                "[{}] Dropped score write for '{}' ({}): {}",
                self.title, participant, clamped, e
            );
        }
        clamped
    }

    /// Add `delta` to the current score
    pub fn adjust_score(&self, participant: &str, delta: Score) -> Score {
        let current = self.score(participant);
        self.set_score(participant, current.saturating_add(delta))
    }

    pub fn reset_score(&self, participant: &str) -> Score {
        self.set_score(participant, 0)
    }

    /// Reset every stored participant; individual failures are logged and skipped
    ///
    /// Returns the number of participants whose reset was persisted.
    pub fn reset_all_scores(&self) -> usize {
        let entries = match self.store.participants() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("[{}] Cannot enumerate participants for reset: {}", self.title, e);
                return 0;
            }
        };

        let floor = self.clamp(0);
        let mut reset = 0;
        for (participant, previous) in entries {
            match self.write_score(&participant, floor, previous) {
                Ok(()) => reset += 1,
                Err(e) => warn!(
                    "[{}] Failed to reset '{}', continuing: {}",
                    self.title, participant, e
                ),
            }
        }

        info!("[{}] Reset {} participant scores", self.title, reset);
        reset
    }

    /// Enroll a participant at the floor tier if they have no score yet
    ///
    /// Returns true when the participant was newly enrolled.
    pub fn enroll(&self, participant: &str) -> bool {
        if self.score(participant) == 0 {
            self.set_score(participant, 0);
            self.send(
                participant,
                &Notice::Enrolled {
                    title: self.title.clone(),
                },
            );
            true
        } else {
            self.send(
                participant,
                &Notice::AlreadyEnrolled {
                    title: self.title.clone(),
                },
            );
            false
        }
    }

    /// Every stored participant, in store order
    pub fn participants(&self) -> Vec<Standing> {
        match self.store.participants() {
            Ok(entries) => entries
                .into_iter()
                .map(|(participant, score)| Standing {
                    tier: self.tier_for_score(score).to_string(),
                    participant,
                    score,
                })
                .collect(),
            Err(e) => {
                warn!("[{}] Cannot enumerate participants: {}", self.title, e);
                Vec::new()
            }
        }
    }

    /// Stored participants by descending score; ties keep store order
    pub fn leaderboard(&self) -> Vec<Standing> {
        let mut standings = self.participants();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }

    pub fn top(&self, count: usize) -> Vec<Standing> {
        let mut standings = self.leaderboard();
        standings.truncate(count);
        standings
    }

    /// 1-based leaderboard position, `None` for unscored participants
    pub fn standing(&self, participant: &str) -> Option<usize> {
        self.leaderboard()
            .iter()
            .position(|standing| standing.participant == participant)
            .map(|index| index + 1)
    }

    /// Number of stored participants per tier, lowest tier first
    pub fn tier_population(&self) -> Vec<(String, usize)> {
        let standings = self.participants();
        self.table
            .tiers()
            .iter()
            .map(|tier| {
                let count = standings.iter().filter(|s| s.tier == tier.name).count();
                (tier.name.clone(), count)
            })
            .collect()
    }

    /// Apply the current tier rules to every stored participant
    ///
    /// Run once when the system is registered so existing scores get clamped
    /// and labelled. Returns the number of participants processed.
    pub fn attach_existing(&self) -> usize {
        let entries = match self.store.participants() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("[{}] Cannot attach existing participants: {}", self.title, e);
                return 0;
            }
        };

        let count = entries.len();
        for (participant, score) in entries {
            self.set_score(&participant, score);
        }
        info!(
            "[{}] Registered rank system with {} existing participants",
            self.title, count
        );
        count
    }

    /// Bring stored scores and reachable participants' labels back in line
    ///
    /// Scores edited behind the system's back are re-applied, then every
    /// reachable participant missing their correct tier label gets it. Returns
    /// the number of corrections made.
    pub fn reconcile(&self) -> usize {
        let mut corrected = 0;

        match self.store.participants() {
            Ok(entries) => {
                for (participant, score) in entries {
                    let last_known = self.last_known_score(&participant);
                    if last_known == Some(score) {
                        continue;
                    }
                    debug!(
                        "[{}] Score of '{}' changed externally to {}",
                        self.title, participant, score
                    );
                    let clamped = self.clamp(score);
                    if let Err(e) =
                        self.write_score(&participant, clamped, last_known.unwrap_or(score))
                    {
                        warn!(
                            "[{}] Failed to re-apply score of '{}': {}",
                            self.title, participant, e
                        );
                    }
                    corrected += 1;
                }
            }
            Err(e) => {
                warn!("[{}] Skipping score reconciliation: {}", self.title, e);
                return corrected;
            }
        }

        let reachable = match self.directory.reachable() {
            Ok(reachable) => reachable,
            Err(e) => {
                warn!("[{}] Skipping label reconciliation: {}", self.title, e);
                return corrected;
            }
        };

        for participant in reachable {
            let correct = self.tier_for_score(self.score(&participant)).to_string();
            let correct_label = self.label_for(&correct);
            let labels = match self.directory.labels(&participant) {
                Ok(labels) => labels,
                Err(e) => {
                    warn!(
                        "[{}] Cannot read labels of '{}': {}",
                        self.title, participant, e
                    );
                    continue;
                }
            };
            if labels.contains(&correct_label) {
                continue;
            }

            let prefix = format!("{}:", self.rank_key());
            let previous = labels
                .iter()
                .find_map(|label| label.strip_prefix(&prefix))
                .unwrap_or(UNKNOWN_TIER)
                .to_string();

            self.replace_label(&participant, &correct);
            self.send(
                &participant,
                &Notice::TierChanged {
                    title: self.title.clone(),
                    from: previous,
                    to: correct,
                },
            );
            corrected += 1;
        }

        corrected
    }

    fn clamp(&self, score: Score) -> Score {
        let tier = self.table.tier_for_score(score);
        score.max(tier.threshold)
    }

    fn last_known_score(&self, participant: &str) -> Option<Score> {
        self.last_known
            .read()
            .ok()
            .and_then(|known| known.get(participant).copied())
    }

    fn remember(&self, participant: &str, score: Score) {
        if let Ok(mut known) = self.last_known.write() {
            known.insert(participant.to_string(), score);
        }
    }

    /// Persist an already clamped score, then refresh label and notify
    ///
    /// `previous` decides the tier the participant is moving from. Nothing but
    /// the store is touched when the write fails.
    fn write_score(&self, participant: &str, score: Score, previous: Score) -> Result<()> {
        let old_tier = self.tier_for_score(previous).to_string();
        let new_tier = self.tier_for_score(score).to_string();

        self.store.set(participant, score)?;
        self.remember(participant, score);

        match self.directory.is_reachable(participant) {
            Ok(true) => {
                self.replace_label(participant, &new_tier);
                if old_tier != new_tier {
                    info!(
                        "[{}] '{}' moved from {} to {}",
                        self.title, participant, old_tier, new_tier
                    );
                    self.send(
                        participant,
                        &Notice::TierChanged {
                            title: self.title.clone(),
                            from: old_tier,
                            to: new_tier,
                        },
                    );
                }
            }
            Ok(false) => {
                debug!(
                    "[{}] '{}' is offline, label refresh deferred",
                    self.title, participant
                );
            }
            Err(e) => warn!(
                "[{}] Cannot resolve '{}' for label refresh: {}",
                self.title, participant, e
            ),
        }

        Ok(())
    }

    /// Swap every `<rank_key>:` label for the label of `tier`
    fn replace_label(&self, participant: &str, tier: &str) {
        let prefix = format!("{}:", self.rank_key());
        let target = self.label_for(tier);

        let result = self.directory.labels(participant).and_then(|labels| {
            for label in labels.iter().filter(|l| l.starts_with(&prefix) && **l != target) {
                self.directory.remove_label(participant, label)?;
            }
            if !labels.contains(&target) {
                self.directory.add_label(participant, &target)?;
            }
            Ok(())
        });

        if let Err(e) = result {
            warn!(
                "[{}] Failed to update tier label of '{}': {}",
                self.title, participant, e
            );
        }
    }

    fn send(&self, participant: &str, notice: &Notice) {
        if let Err(e) = self.directory.notify(participant, notice) {
            warn!(
                "[{}] Failed to notify '{}': {}",
                self.title, participant, e
            );
        }
    }
}

impl std::fmt::Debug for RankSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankSystem")
            .field("title", &self.title)
            .field("rank_key", &self.rank_key())
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::registry::InMemoryRegistry;

    struct Fixture {
        registry: Arc<InMemoryRegistry>,
        directory: Arc<InMemoryDirectory>,
        system: RankSystem,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRegistry::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let system = RankSystem::from_tiers(
            "Ranked",
            "ranked",
            vec!["Bronze".into(), "Silver".into(), "Gold".into()],
            vec![0, 100, 300],
            registry.clone(),
            directory.clone(),
        )
        .unwrap();
        Fixture {
            registry,
            directory,
            system,
        }
    }

    fn tier_changes(directory: &InMemoryDirectory, participant: &str) -> Vec<(String, String)> {
        directory
            .notices_for(participant)
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::TierChanged { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_score_defaults_to_zero() {
        let f = fixture();
        assert_eq!(f.system.score("alice"), 0);
    }

    #[test]
    fn test_set_score_persists_and_relabels() {
        let f = fixture();
        f.directory.connect("alice");

        assert_eq!(f.system.set_score("alice", 150), 150);
        assert_eq!(f.registry.get("ranked:alice").unwrap(), Some(150));
        assert_eq!(
            f.directory.labels("alice").unwrap(),
            vec!["ranked:Silver".to_string()]
        );
        assert_eq!(
            tier_changes(&f.directory, "alice"),
            vec![("Bronze".to_string(), "Silver".to_string())]
        );

        f.system.set_score("alice", 320);
        assert_eq!(
            f.directory.labels("alice").unwrap(),
            vec!["ranked:Gold".to_string()]
        );
    }

    #[test]
    fn test_same_tier_update_does_not_notify() {
        let f = fixture();
        f.directory.connect("alice");
        f.system.set_score("alice", 120);
        f.directory.clear_log();

        f.system.set_score("alice", 180);
        assert!(tier_changes(&f.directory, "alice").is_empty());
    }

    #[test]
    fn test_negative_scores_clamp_to_floor_tier() {
        let f = fixture();
        assert_eq!(f.system.set_score("alice", -40), 0);
        assert_eq!(f.system.score("alice"), 0);
    }

    #[test]
    fn test_adjust_score() {
        let f = fixture();
        f.system.set_score("alice", 90);
        assert_eq!(f.system.adjust_score("alice", 15), 105);
        assert_eq!(f.system.adjust_score("alice", -200), 0);
    }

    #[test]
    fn test_store_outage_never_raises() {
        let f = fixture();
        f.system.set_score("alice", 150);
        f.registry.set_available(false);

        assert_eq!(f.system.score("alice"), 0);
        assert!(f.system.participants().is_empty());

        f.registry.set_available(true);
        assert_eq!(f.system.score("alice"), 150);
    }

    #[test]
    fn test_dropped_write_keeps_label_and_stays_quiet() {
        let f = fixture();
        f.directory.connect("alice");
        f.system.set_score("alice", 150);
        f.directory.clear_log();

        f.registry.set_available(false);
        f.system.set_score("alice", 400);
        f.registry.set_available(true);

        assert_eq!(f.registry.get("ranked:alice").unwrap(), Some(150));
        assert_eq!(
            f.directory.labels("alice").unwrap(),
            vec!["ranked:Silver".to_string()]
        );
        assert!(tier_changes(&f.directory, "alice").is_empty());
        assert_eq!(f.system.reconcile(), 0);
    }

    /// Serves reads from the wrapped registry and rejects every write
    struct ReadOnlyRegistry(InMemoryRegistry);

    impl ExternalRegistry for ReadOnlyRegistry {
        fn set(&self, key: &str, _value: i64) -> Result<()> {
            Err(crate::error::MatchmakingError::StoreUnavailable {
                message: format!("{} is read-only", key),
            }
            .into())
        }

        fn get(&self, key: &str) -> Result<Option<i64>> {
            self.0.get(key)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.set(key, 0)
        }

        fn keys(&self) -> Result<Vec<String>> {
            self.0.keys()
        }
    }

    #[test]
    fn test_rejected_write_is_not_remembered() {
        let inner = InMemoryRegistry::new();
        inner.set("ranked:alice", 150).unwrap();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.connect("alice");
        directory.add_label("alice", "ranked:Silver").unwrap();
        let system = RankSystem::from_tiers(
            "Ranked",
            "ranked",
            vec!["Bronze".into(), "Silver".into(), "Gold".into()],
            vec![0, 100, 300],
            Arc::new(ReadOnlyRegistry(inner)),
            directory.clone(),
        )
        .unwrap();

        assert_eq!(system.set_score("alice", 400), 400);
        assert_eq!(system.reset_all_scores(), 0);

        assert_eq!(system.score("alice"), 150);
        assert_eq!(system.last_known_score("alice"), None);
        assert_eq!(
            directory.labels("alice").unwrap(),
            vec!["ranked:Silver".to_string()]
        );
        assert!(tier_changes(&directory, "alice").is_empty());
    }

    #[test]
    fn test_reset_all_scores() {
        let f = fixture();
        f.system.set_score("alice", 150);
        f.system.set_score("bob", 350);

        assert_eq!(f.system.reset_all_scores(), 2);
        assert_eq!(f.system.score("alice"), 0);
        assert_eq!(f.system.score("bob"), 0);
    }

    #[test]
    fn test_enroll_only_once() {
        let f = fixture();
        f.directory.connect("alice");

        assert!(f.system.enroll("alice"));
        assert_eq!(
            f.directory.labels("alice").unwrap(),
            vec!["ranked:Bronze".to_string()]
        );

        f.system.set_score("alice", 50);
        assert!(!f.system.enroll("alice"));
        assert!(f
            .directory
            .notices_for("alice")
            .contains(&Notice::AlreadyEnrolled {
                title: "Ranked".to_string()
            }));
    }

    #[test]
    fn test_leaderboard_queries() {
        let f = fixture();
        f.system.set_score("alice", 150);
        f.system.set_score("bob", 350);
        f.system.set_score("carol", 20);

        let top = f.system.top(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].participant, "bob");
        assert_eq!(top[0].tier, "Gold");
        assert_eq!(top[1].participant, "alice");

        assert_eq!(f.system.standing("carol"), Some(3));
        assert_eq!(f.system.standing("dave"), None);
        assert_eq!(
            f.system.tier_population(),
            vec![
                ("Bronze".to_string(), 1),
                ("Silver".to_string(), 1),
                ("Gold".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_attach_existing_labels_online_participants() {
        let f = fixture();
        f.registry.set("ranked:alice", 310).unwrap();
        f.directory.connect("alice");

        assert_eq!(f.system.attach_existing(), 1);
        assert_eq!(
            f.directory.labels("alice").unwrap(),
            vec!["ranked:Gold".to_string()]
        );
    }

    #[test]
    fn test_reconcile_picks_up_external_edits() {
        let f = fixture();
        f.directory.connect("alice");
        f.system.set_score("alice", 50);
        f.directory.clear_log();

        // Another system edits the score directly
        f.registry.set("ranked:alice", 120).unwrap();

        assert!(f.system.reconcile() >= 1);
        assert_eq!(
            f.directory.labels("alice").unwrap(),
            vec!["ranked:Silver".to_string()]
        );
        assert_eq!(
            tier_changes(&f.directory, "alice"),
            vec![("Bronze".to_string(), "Silver".to_string())]
        );

        // Nothing left to correct
        assert_eq!(f.system.reconcile(), 0);
    }

    #[test]
    fn test_reconcile_labels_participants_who_come_online() {
        let f = fixture();
        f.system.set_score("bob", 400);
        assert!(f.directory.labels("bob").unwrap().is_empty());

        f.directory.connect("bob");
        assert_eq!(f.system.reconcile(), 1);
        assert_eq!(
            f.directory.labels("bob").unwrap(),
            vec!["ranked:Gold".to_string()]
        );
        assert_eq!(
            tier_changes(&f.directory, "bob"),
            vec![("unknown".to_string(), "Gold".to_string())]
        );
    }
}
