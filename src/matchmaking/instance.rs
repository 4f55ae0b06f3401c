//! Match instance and countdown state machine
//!
//! A match is created full, enters its countdown on the next countdown pass
//! once it has enough players, and ends when the countdown runs out or an
//! admin force-ends it. Ended matches are removed from the engine, so `Ended`
//! is only ever observed on a match that is being torn down.

use crate::error::{MatchmakingError, Result};
use crate::types::{MatchId, ParticipantId, Tick};
use crate::utils::{ceil_div, ticks_since};
use serde::{Deserialize, Serialize};

/// Possible states of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    /// Formed but not yet counting down (never published)
    Forming,
    /// Countdown running
    Countdown,
    /// Started or force ended (terminal state)
    Ended,
}

/// What a countdown pass should do with a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Not enough players to begin counting down
    Idle,
    /// Enter the countdown now
    Begin,
    /// Counting, but outside the announcement window
    Quiet,
    /// Counting, announce the remaining seconds
    Announce(i64),
    /// Countdown reached zero
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    id: MatchId,
    players: Vec<ParticipantId>,
    rank_group: Option<String>,
    created_at_tick: Tick,
    countdown_started_at_tick: Option<Tick>,
    state: MatchState,
}

impl Match {
    pub fn new(
        id: MatchId,
        players: Vec<ParticipantId>,
        rank_group: Option<String>,
        created_at_tick: Tick,
    ) -> Self {
        Self {
            id,
            players,
            rank_group,
            created_at_tick,
            countdown_started_at_tick: None,
            state: MatchState::Forming,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn players(&self) -> &[ParticipantId] {
        &self.players
    }

    pub fn has_player(&self, participant: &str) -> bool {
        self.players.iter().any(|p| p == participant)
    }

    pub fn rank_group(&self) -> Option<&str> {
        self.rank_group.as_deref()
    }

    pub fn created_at_tick(&self) -> Tick {
        self.created_at_tick
    }

    pub fn countdown_started_at_tick(&self) -> Option<Tick> {
        self.countdown_started_at_tick
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn is_counting_down(&self) -> bool {
        self.state == MatchState::Countdown
    }

    /// Enter the countdown at `now`; the start tick is set once and never moves
    pub fn begin_countdown(&mut self, now: Tick) -> Result<()> {
        if self.state != MatchState::Forming {
            return Err(MatchmakingError::InternalError {
                message: format!(
                    "match {} cannot begin countdown from {:?}",
                    self.id, self.state
                ),
            }
            .into());
        }
        self.countdown_started_at_tick = Some(now);
        self.state = MatchState::Countdown;
        Ok(())
    }

    /// Whole seconds left in the countdown, rounded up
    ///
    /// `None` before the countdown starts; zero or negative once it is over.
    pub fn remaining_seconds(
        &self,
        now: Tick,
        duration_seconds: u64,
        ticks_per_second: u64,
    ) -> Option<i64> {
        let started = self.countdown_started_at_tick?;
        let tps = ticks_per_second.max(1) as i64;
        let total = (duration_seconds as i64).saturating_mul(tps);
        let elapsed = ticks_since(now, started) as i64;
        Some(ceil_div(total - elapsed, tps))
    }

    /// Decide the countdown action for this pass
    pub fn countdown_step(
        &self,
        now: Tick,
        min_players_to_start: usize,
        duration_seconds: u64,
        ticks_per_second: u64,
        announce_seconds: u64,
    ) -> CountdownStep {
        match self.state {
            MatchState::Forming if self.players.len() >= min_players_to_start => {
                CountdownStep::Begin
            }
            MatchState::Forming | MatchState::Ended => CountdownStep::Idle,
            MatchState::Countdown => {
                match self.remaining_seconds(now, duration_seconds, ticks_per_second) {
                    Some(remaining) if remaining <= 0 => CountdownStep::Start,
                    Some(remaining) if remaining <= announce_seconds as i64 => {
                        CountdownStep::Announce(remaining)
                    }
                    _ => CountdownStep::Quiet,
                }
            }
        }
    }

    pub fn mark_ended(&mut self) {
        self.state = MatchState::Ended;
    }
}
