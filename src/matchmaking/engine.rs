//! Matchmaking engine for one match type
//!
//! The engine owns the waiting pool, the active matches and the rank group
//! configuration. Queue and admin operations take effect immediately; grouping,
//! countdowns and deferred cleanups only advance inside [`MatchmakingEngine::tick`].

use crate::config::{MatchmakingConfig, RankGroupSettings};
use crate::directory::ParticipantDirectory;
use crate::error::{MatchmakingError, Result};
use crate::matchmaking::grouper::{group_by_rank, group_random, GroupingOutcome, GroupingStrategy};
use crate::matchmaking::groups::{RankGroup, RankGroupConfig};
use crate::matchmaking::instance::{CountdownStep, Match};
use crate::matchmaking::publisher::StatusPublisher;
use crate::matchmaking::waiting::WaitingSet;
use crate::rank::RankSystem;
use crate::registry::ExternalRegistry;
use crate::types::{MatchId, Notice, ParticipantId, QueueStatus, Tick};
use crate::utils::{generate_match_id, ticks_since};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Statistics about engine operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Total number of participants accepted into the queue
    pub participants_queued: u64,
    /// Total number of matches formed
    pub matches_formed: u64,
    /// Total number of matches whose countdown ran out
    pub matches_started: u64,
    /// Total number of matches ended by an admin
    pub matches_force_ended: u64,
    /// Total number of participants dropped for matching no rank group
    pub participants_dropped_unranked: u64,
    /// Current number of active matches
    pub active_matches: usize,
    /// Current number of participants waiting
    pub participants_waiting: usize,
}

/// Published keys of an ended match waiting to be cleared
#[derive(Debug, Clone)]
struct PendingCleanup {
    due: Tick,
    match_id: MatchId,
    players: Vec<ParticipantId>,
}

pub struct MatchmakingEngine {
    title: String,
    config: MatchmakingConfig,
    rank_system: Option<Arc<RankSystem>>,
    rank_groups: RankGroupConfig,
    waiting: WaitingSet,
    /// Active matches, ordered by id so every pass is deterministic
    matches: BTreeMap<MatchId, Match>,
    cleanups: Vec<PendingCleanup>,
    publisher: StatusPublisher,
    directory: Arc<dyn ParticipantDirectory>,
    rng: StdRng,
    /// Ids whose published keys would collide with a rank key prefix
    reserved_ids: BTreeSet<ParticipantId>,
    last_grouping_tick: Tick,
    current_tick: Tick,
    stats: EngineStats,
}

impl MatchmakingEngine {
    /// Create an engine; fails with a configuration error on invalid settings
    pub fn new(
        title: impl Into<String>,
        config: MatchmakingConfig,
        rank_system: Option<Arc<RankSystem>>,
        registry: Arc<dyn ExternalRegistry>,
        directory: Arc<dyn ParticipantDirectory>,
    ) -> Result<Self> {
        config.validate()?;
        let title = title.into();

        info!(
            "[{}] Matchmaking engine created - max: {}, min: {}, countdown: {}s, rank system: {:?}",
            title,
            config.max_players_per_match,
            config.min_players_to_start,
            config.countdown_duration_seconds,
            rank_system.as_ref().map(|system| system.title())
        );

        let reserved_ids = rank_system
            .iter()
            .map(|system| system.rank_key().to_string())
            .collect();

        Ok(Self {
            publisher: StatusPublisher::new(registry, title.clone()),
            rank_groups: RankGroupConfig::new(config.rank_range_enabled),
            title,
            config,
            rank_system,
            waiting: WaitingSet::new(),
            matches: BTreeMap::new(),
            cleanups: Vec::new(),
            directory,
            rng: StdRng::from_entropy(),
            reserved_ids,
            last_grouping_tick: 0,
            current_tick: 0,
            stats: EngineStats::default(),
        })
    }

    /// Use a deterministic random source for shuffling and match ids
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Refuse participants named after any of these rank keys
    ///
    /// Rank scores and published keys share one registry, so a participant
    /// called `ranked` would publish `ranked:waiting` into the score space of
    /// the `ranked` rank system. The engine's own rank key is always reserved.
    pub fn with_reserved_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ParticipantId>,
    {
        self.reserved_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Install the initial rank groups; any invalid group aborts construction
    pub fn with_rank_groups(mut self, groups: &[RankGroupSettings]) -> Result<Self> {
        for group in groups {
            let table = self.rank_system.as_ref().map(|system| system.table());
            self.rank_groups
                .add_group(&group.name, &group.start_tier, &group.end_tier, table)
                .map_err(|e| {
                    MatchmakingError::configuration(format!(
                        "[{}] invalid rank group '{}': {}",
                        self.title, group.name, e
                    ))
                })?;
        }
        Ok(self)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    pub fn rank_system(&self) -> Option<&Arc<RankSystem>> {
        self.rank_system.as_ref()
    }

    pub fn rank_groups(&self) -> &RankGroupConfig {
        &self.rank_groups
    }

    /// Last tick seen by [`tick`](Self::tick)
    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn is_waiting(&self, participant: &str) -> bool {
        self.waiting.contains(participant)
    }

    pub fn waiting_participants(&self) -> Vec<ParticipantId> {
        self.waiting.to_vec()
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.values()
    }

    pub fn get_match(&self, match_id: &str) -> Option<&Match> {
        self.matches.get(match_id)
    }

    /// Active match containing the participant, if any
    pub fn match_of(&self, participant: &str) -> Option<&Match> {
        self.matches.values().find(|m| m.has_player(participant))
    }

    /// Add a participant to the waiting pool
    pub fn join(&mut self, participant: &str) -> Result<()> {
        self.ensure_not_reserved(participant)?;

        if let Some(existing) = self.match_of(participant) {
            let match_id = existing.id().to_string();
            self.send(
                participant,
                &Notice::AlreadyInMatch {
                    title: self.title.clone(),
                    match_id: match_id.clone(),
                },
            );
            return Err(MatchmakingError::AlreadyInMatch {
                participant: participant.to_string(),
                match_id,
            }
            .into());
        }

        if !self.waiting.insert(participant) {
            self.send(
                participant,
                &Notice::AlreadyWaiting {
                    title: self.title.clone(),
                },
            );
            return Err(MatchmakingError::AlreadyWaiting {
                participant: participant.to_string(),
            }
            .into());
        }

        self.publisher.set_waiting(participant, true);
        self.publisher.clear_match_id(participant);
        self.stats.participants_queued += 1;
        debug!(
            "[{}] '{}' joined the queue - waiting: {}",
            self.title,
            participant,
            self.waiting.len()
        );

        self.send(
            participant,
            &Notice::QueueJoined {
                title: self.title.clone(),
            },
        );
        self.broadcast_status();
        Ok(())
    }

    /// Remove a participant from the waiting pool
    pub fn leave(&mut self, participant: &str) -> Result<()> {
        if !self.waiting.remove(participant) {
            self.send(
                participant,
                &Notice::NotWaiting {
                    title: self.title.clone(),
                },
            );
            return Err(MatchmakingError::NotWaiting {
                participant: participant.to_string(),
            }
            .into());
        }

        self.publisher.set_waiting(participant, false);
        debug!(
            "[{}] '{}' left the queue - waiting: {}",
            self.title,
            participant,
            self.waiting.len()
        );

        self.send(
            participant,
            &Notice::QueueLeft {
                title: self.title.clone(),
            },
        );
        self.broadcast_status();
        Ok(())
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            title: self.title.clone(),
            waiting: self.waiting.to_vec(),
            waiting_count: self.waiting.len(),
            max_players_per_match: self.config.max_players_per_match,
            active_matches: self.matches.len(),
        }
    }

    /// Send the queue status to a participant
    pub fn show_status(&self, participant: &str) -> QueueStatus {
        let status = self.status();
        self.send(participant, &Notice::QueueStatus(status.clone()));
        status
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            active_matches: self.matches.len(),
            participants_waiting: self.waiting.len(),
            ..self.stats.clone()
        }
    }

    /// Advance the engine to logical tick `now`
    ///
    /// Groups the waiting pool once per matching interval, then advances every
    /// active countdown and runs the cleanups that have come due. A failure on
    /// one match is logged and does not stop the others.
    pub fn tick(&mut self, now: Tick) {
        self.current_tick = now;

        if ticks_since(now, self.last_grouping_tick) >= self.config.matching_interval_ticks {
            self.last_grouping_tick = now;
            self.run_grouping(now);
        }

        let ids: Vec<MatchId> = self.matches.keys().cloned().collect();
        for match_id in ids {
            if let Err(e) = self.advance_match(&match_id, now) {
                error!(
                    "[{}] Failed to advance match {}: {}",
                    self.title, match_id, e
                );
            }
        }

        self.run_due_cleanups(now);
    }

    /// Form a match from `players` at the current tick
    ///
    /// Players are taken out of the waiting pool, notified with the full roster
    /// and get the match token published.
    pub fn create_match(
        &mut self,
        players: Vec<ParticipantId>,
        rank_group: Option<String>,
    ) -> Result<MatchId> {
        if players.is_empty() || players.len() > self.config.max_players_per_match {
            return Err(MatchmakingError::validation(format!(
                "a match needs between 1 and {} players, got {}",
                self.config.max_players_per_match,
                players.len()
            ))
            .into());
        }
        let mut seen = HashSet::new();
        for player in &players {
            if !seen.insert(player.as_str()) {
                return Err(MatchmakingError::validation(format!(
                    "duplicate player '{}' in roster",
                    player
                ))
                .into());
            }
            self.ensure_not_reserved(player)?;
            if let Some(existing) = self.match_of(player) {
                return Err(MatchmakingError::AlreadyInMatch {
                    participant: player.clone(),
                    match_id: existing.id().to_string(),
                }
                .into());
            }
        }

        let match_id = generate_match_id(&mut self.rng, |id| self.matches.contains_key(id));
        for player in &players {
            self.waiting.remove(player);
        }

        info!(
            "[{}] Match {} formed - players: {}, group: {:?}",
            self.title,
            match_id,
            players.join(", "),
            rank_group
        );

        for player in &players {
            self.publisher.set_waiting(player, false);
            self.publisher.set_match_id(player, &match_id);
            self.send(
                player,
                &Notice::MatchFormed {
                    title: self.title.clone(),
                    match_id: match_id.clone(),
                    roster: players.clone(),
                },
            );
        }

        let formed = Match::new(match_id.clone(), players, rank_group, self.current_tick);
        self.matches.insert(match_id.clone(), formed);
        self.stats.matches_formed += 1;
        Ok(match_id)
    }

    /// End a match on request
    ///
    /// Unknown ids are reported to the requester and leave everything untouched.
    pub fn force_end(&mut self, match_id: &str, requester: Option<&str>) -> Result<()> {
        if !self.matches.contains_key(match_id) {
            if let Some(requester) = requester {
                self.send(
                    requester,
                    &Notice::MatchNotFound {
                        match_id: match_id.to_string(),
                    },
                );
            }
            return Err(MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            }
            .into());
        }

        self.end_match(match_id, self.current_tick)?;
        self.stats.matches_force_ended += 1;
        warn!("[{}] Match {} force ended", self.title, match_id);

        if let Some(requester) = requester {
            self.send(
                requester,
                &Notice::MatchForceEnded {
                    match_id: match_id.to_string(),
                },
            );
        }
        Ok(())
    }

    pub fn enable_rank_matching(&mut self, requester: Option<&str>) {
        self.rank_groups.enable();
        if self.rank_system.is_none() {
            warn!(
                "[{}] Rank matching enabled without a rank system, grouping stays random",
                self.title
            );
        }
        self.acknowledge(requester, "Rank matching enabled.");
    }

    pub fn disable_rank_matching(&mut self, requester: Option<&str>) {
        self.rank_groups.disable();
        self.acknowledge(requester, "Rank matching disabled.");
    }

    pub fn add_rank_group(
        &mut self,
        name: &str,
        start_tier: &str,
        end_tier: &str,
        requester: Option<&str>,
    ) -> Result<()> {
        let table = self.rank_system.as_ref().map(|system| system.table());
        let result = self.rank_groups.add_group(name, start_tier, end_tier, table);
        self.report(
            requester,
            result,
            format!(
                "Added rank group '{}' ({} - {}).",
                name, start_tier, end_tier
            ),
        )
    }

    pub fn set_rank_group(
        &mut self,
        name: &str,
        start_tier: &str,
        end_tier: &str,
        requester: Option<&str>,
    ) -> Result<()> {
        let table = self.rank_system.as_ref().map(|system| system.table());
        let result = self.rank_groups.set_group(name, start_tier, end_tier, table);
        self.report(
            requester,
            result,
            format!(
                "Set rank group '{}' to {} - {}.",
                name, start_tier, end_tier
            ),
        )
    }

    /// Remove a rank group; unknown names are reported as not found
    pub fn remove_rank_group(&mut self, name: &str, requester: Option<&str>) -> Result<RankGroup> {
        let result: Result<RankGroup> = self.rank_groups.remove_group(name).ok_or_else(|| {
            MatchmakingError::GroupNotFound {
                name: name.to_string(),
            }
            .into()
        });
        self.report(requester, result, format!("Removed rank group '{}'.", name))
    }

    /// Current rank groups, also sent to the requester as a listing
    pub fn list_rank_groups(&self, requester: Option<&str>) -> Vec<RankGroup> {
        let groups = self.rank_groups.list_groups().to_vec();
        if let Some(requester) = requester {
            let detail = if groups.is_empty() {
                "No rank groups configured.".to_string()
            } else {
                let lines: Vec<String> = groups
                    .iter()
                    .map(|g| format!("{}: {} - {}", g.name, g.start_tier, g.end_tier))
                    .collect();
                format!("Rank groups: {}", lines.join("; "))
            };
            self.send(
                requester,
                &Notice::RankGroupUpdated {
                    title: self.title.clone(),
                    detail,
                },
            );
        }
        groups
    }

    fn run_grouping(&mut self, now: Tick) {
        if self.waiting.is_empty() {
            return;
        }

        let strategy = GroupingStrategy::select(
            self.rank_groups.is_enabled(),
            self.rank_system.is_some(),
        );
        let waiting = self.waiting.drain();
        let max = self.config.max_players_per_match;

        let outcome: GroupingOutcome = match (strategy, self.rank_system.clone()) {
            (GroupingStrategy::ByRank, Some(system)) => group_by_rank(
                waiting,
                self.rank_groups.list_groups(),
                system.table(),
                |participant| system.score(participant),
                max,
            ),
            _ => group_random(waiting, max, &mut self.rng),
        };

        let mut remaining = outcome.remaining;
        for participant in outcome.unranked {
            if self.config.requeue_unranked {
                remaining.push(participant);
                continue;
            }
            warn!(
                "[{}] '{}' does not belong to any rank group, removed from queue",
                self.title, participant
            );
            self.publisher.set_waiting(&participant, false);
            self.stats.participants_dropped_unranked += 1;
        }
        self.waiting.refill(remaining);

        debug!(
            "[{}] Grouping at tick {} ({:?}) - formed: {}, still waiting: {}",
            self.title,
            now,
            strategy,
            outcome.formed.len(),
            self.waiting.len()
        );

        for group in outcome.formed {
            if let Err(e) = self.create_match(group.players, group.rank_group) {
                error!("[{}] Failed to create match: {}", self.title, e);
            }
        }
    }

    fn advance_match(&mut self, match_id: &str, now: Tick) -> Result<()> {
        let step = self
            .matches
            .get(match_id)
            .ok_or_else(|| MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            })?
            .countdown_step(
                now,
                self.config.min_players_to_start,
                self.config.countdown_duration_seconds,
                self.config.ticks_per_second,
                self.config.countdown_announce_seconds,
            );

        match step {
            CountdownStep::Idle | CountdownStep::Quiet => Ok(()),
            CountdownStep::Begin => self.begin_countdown(match_id, now),
            CountdownStep::Announce(remaining) => {
                for player in self.players_of(match_id) {
                    self.send(
                        &player,
                        &Notice::CountdownTick {
                            title: self.title.clone(),
                            remaining_seconds: remaining,
                        },
                    );
                }
                Ok(())
            }
            CountdownStep::Start => {
                for player in self.players_of(match_id) {
                    self.send(
                        &player,
                        &Notice::MatchStarted {
                            title: self.title.clone(),
                            match_id: match_id.to_string(),
                        },
                    );
                }
                info!("[{}] Match {} started", self.title, match_id);
                self.stats.matches_started += 1;
                self.end_match(match_id, now)
            }
        }
    }

    fn begin_countdown(&mut self, match_id: &str, now: Tick) -> Result<()> {
        let players = {
            let m = self
                .matches
                .get_mut(match_id)
                .ok_or_else(|| MatchmakingError::MatchNotFound {
                    match_id: match_id.to_string(),
                })?;
            m.begin_countdown(now)?;
            m.players().to_vec()
        };

        self.publisher.set_match_started(true);
        for player in &players {
            self.publisher.set_waiting(player, false);
            self.publisher.set_player(player);
            self.send(
                player,
                &Notice::CountdownStarted {
                    title: self.title.clone(),
                    seconds: self.config.countdown_duration_seconds,
                },
            );
        }

        info!(
            "[{}] Match {} countdown started at tick {} ({}s)",
            self.title, match_id, now, self.config.countdown_duration_seconds
        );
        Ok(())
    }

    fn end_match(&mut self, match_id: &str, now: Tick) -> Result<()> {
        let mut ended = self
            .matches
            .remove(match_id)
            .ok_or_else(|| MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            })?;
        ended.mark_ended();

        for player in ended.players() {
            self.publisher.set_waiting(player, false);
            self.publisher.clear_match_id(player);
            self.send(
                player,
                &Notice::MatchEnded {
                    title: self.title.clone(),
                    match_id: match_id.to_string(),
                },
            );
        }

        self.cleanups.push(PendingCleanup {
            due: now.saturating_add(self.config.cleanup_delay_ticks),
            match_id: match_id.to_string(),
            players: ended.players().to_vec(),
        });

        info!(
            "[{}] Match {} ended - players: {}",
            self.title,
            match_id,
            ended.players().join(", ")
        );
        Ok(())
    }

    fn run_due_cleanups(&mut self, now: Tick) {
        if self.cleanups.is_empty() {
            return;
        }

        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.cleanups)
            .into_iter()
            .partition(|cleanup| cleanup.due <= now);
        self.cleanups = pending;

        for cleanup in due {
            for player in &cleanup.players {
                // Already counting down in a newer match
                if self.match_of(player).is_some() {
                    continue;
                }
                self.publisher.clear_player(player);
            }
            if !self.matches.values().any(Match::is_counting_down) {
                self.publisher.set_match_started(false);
            }
            info!(
                "[{}] Match data reset for {}",
                self.title, cleanup.match_id
            );
        }
    }

    fn players_of(&self, match_id: &str) -> Vec<ParticipantId> {
        self.matches
            .get(match_id)
            .map(|m| m.players().to_vec())
            .unwrap_or_default()
    }

    fn broadcast_status(&self) {
        let line = format!(
            "[{}] {}/{}",
            self.title,
            self.waiting.len(),
            self.config.max_players_per_match
        );
        if let Err(e) = self.directory.broadcast_status(&line) {
            warn!("[{}] Failed to broadcast queue status: {}", self.title, e);
        }
    }

    /// Tell the requester how an admin operation went and hand the result back
    fn report<T>(&self, requester: Option<&str>, result: Result<T>, success: String) -> Result<T> {
        let Some(requester) = requester else {
            return result;
        };
        let notice = match &result {
            Ok(_) => Notice::RankGroupUpdated {
                title: self.title.clone(),
                detail: success,
            },
            Err(e) => Notice::RankGroupRejected {
                title: self.title.clone(),
                reason: e.to_string(),
            },
        };
        self.send(requester, &notice);
        result
    }

    fn acknowledge(&self, requester: Option<&str>, detail: &str) {
        if let Some(requester) = requester {
            self.send(
                requester,
                &Notice::RankGroupUpdated {
                    title: self.title.clone(),
                    detail: detail.to_string(),
                },
            );
        }
    }

    fn ensure_not_reserved(&self, participant: &str) -> Result<()> {
        if self.reserved_ids.contains(participant) {
            warn!(
                "[{}] Refusing '{}': the id is reserved as a rank key",
                self.title, participant
            );
            return Err(MatchmakingError::validation(format!(
                "participant id '{}' is reserved as a rank key",
                participant
            ))
            .into());
        }
        Ok(())
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

impl std::fmt::Debug for MatchmakingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchmakingEngine")
            .field("title", &self.title)
            .field("config", &self.config)
            .field("waiting", &self.waiting.len())
            .field("matches", &self.matches.len())
            .finish_non_exhaustive()
    }
}
